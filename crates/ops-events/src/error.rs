use thiserror::Error;

#[derive(Debug, Error)]
pub enum LineError {
    #[error("I/O error while reading line {line_number}: {source}")]
    Io {
        line_number: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line_number} exceeded max_line_bytes ({observed_bytes} > {max_line_bytes})")]
    TooLong {
        line_number: usize,
        observed_bytes: usize,
        max_line_bytes: usize,
    },
}
