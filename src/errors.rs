//! 核心库的错误类型。
//!
//! 按照 §7 的传播策略：数值/比对相关的内部异常一律在本地被吸收或降级
//! （nil 信号、截断、标记 failed），唯一向上传播的是 I/O 与结构性解析错误。
//! 因此这里只枚举"确实会失败"的那一小撮情形，不为可自我修复的状态建模。

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("cannot open reference FASTA '{path}': {source}")]
    OpenReference {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("FASTA file '{path}' contains no sequences")]
    EmptyReference { path: PathBuf },

    #[error("FASTQ record malformed at line {line}: {reason}")]
    MalformedFastq { line: usize, reason: String },

    #[error("cannot read FM index from '{path}': {source}")]
    LoadIndex {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },

    #[error("cannot write FM index to '{path}': {source}")]
    SaveIndex {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },

    #[error("output sink failed: {0}")]
    OutputSink(#[source] std::io::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
