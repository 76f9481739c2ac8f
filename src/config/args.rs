//! Command-line argument parsing

use clap::Parser;

/// ipsight 命令行参数
#[derive(Debug, Clone, Parser)]
#[command(name = "ipsight", version, about = "Tier-gated IP intelligence service")]
pub struct Cli {
    /// 配置文件路径
    #[arg(short = 'c', long = "config", default_value = "config.toml")]
    pub config: String,

    /// 打印示例配置后退出
    #[arg(long = "generate-config")]
    pub generate_config: bool,
}
