//! handler 共享状态

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::admission::QuotaValidator;
use crate::resolver::BoundedResolver;

pub struct AppState {
    pub resolver: BoundedResolver,
    pub quota: QuotaValidator,
    pub default_lang: String,
    pub batch_timeout: Duration,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        resolver: BoundedResolver,
        quota: QuotaValidator,
        default_lang: impl Into<String>,
        batch_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            resolver,
            quota,
            default_lang: default_lang.into(),
            batch_timeout,
            started_at: Instant::now(),
        })
    }

    /// 空或缺省的 `lang` 使用默认语言
    pub fn lang_or_default<'a>(&'a self, lang: Option<&'a str>) -> &'a str {
        match lang {
            Some(l) if !l.is_empty() => l,
            _ => &self.default_lang,
        }
    }
}
