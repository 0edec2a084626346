//! 命令行定义

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "autofill-ocr")]
#[command(about = "表单自动填写与文件 OCR 工具")]
#[command(version)]
pub struct Cli {
    /// 显示详细日志
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// 上传文件到本地存储
    Upload {
        /// 要上传的文件
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// 列出已保存的文件
    List,

    /// 删除一个文件
    Remove {
        /// 文件 id
        id: String,
    },

    /// 删除全部文件
    Clear,

    /// 对已保存的文件运行 OCR
    Ocr {
        /// 只处理指定 id 的文件（可重复），不指定则处理全部
        #[arg(long = "id")]
        ids: Vec<String>,
    },

    /// 检查 OCR 服务是否可用
    Health,

    /// 读取当前页面第一个表单的 HTML
    FormHtml {
        /// 用无头浏览器打开该 URL，而不是连接已打开的浏览器
        #[arg(long)]
        headless: Option<String>,
    },

    /// 按 JSON 填写当前页面的表单
    Fill {
        /// 形如 `[{"fieldId": "...", "value": "..."}]` 的 JSON
        json: String,

        /// 用无头浏览器打开该 URL，而不是连接已打开的浏览器
        #[arg(long)]
        headless: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_repeated_ids() {
        let cli = Cli::parse_from(["autofill-ocr", "ocr", "--id", "a", "--id", "b"]);
        match cli.command {
            Command::Ocr { ids } => assert_eq!(ids, vec!["a", "b"]),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn verbose_is_global() {
        let cli = Cli::parse_from(["autofill-ocr", "list", "-v"]);
        assert!(cli.verbose);
    }
}
