//! Minimal OSC 1.0 message encoder.
//!
//! Only what a chatbox needs: a single message (no bundles) with string, int32,
//! float32 and boolean arguments. Every field is padded to a 4-byte boundary.

#[derive(Debug, Clone, PartialEq)]
pub enum OscArg {
    String(String),
    Int(i32),
    Float(f32),
    Bool(bool),
}

impl OscArg {
    fn type_tag(&self) -> char {
        match self {
            OscArg::String(_) => 's',
            OscArg::Int(_) => 'i',
            OscArg::Float(_) => 'f',
            OscArg::Bool(true) => 'T',
            OscArg::Bool(false) => 'F',
        }
    }
}

impl From<&str> for OscArg {
    fn from(value: &str) -> Self {
        OscArg::String(value.to_string())
    }
}

impl From<bool> for OscArg {
    fn from(value: bool) -> Self {
        OscArg::Bool(value)
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum OscEncodeError {
    #[error("OSC address must start with '/': {0:?}")]
    InvalidAddress(String),
    #[error("OSC strings can't contain NUL bytes")]
    NulInString,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    pub address: String,
    pub args: Vec<OscArg>,
}

impl OscMessage {
    pub fn new(address: impl Into<String>, args: Vec<OscArg>) -> Self {
        Self {
            address: address.into(),
            args,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, OscEncodeError> {
        if !self.address.starts_with('/') {
            return Err(OscEncodeError::InvalidAddress(self.address.clone()));
        }

        let mut buf = Vec::new();
        write_padded_str(&mut buf, &self.address)?;

        let tags: String = std::iter::once(',')
            .chain(self.args.iter().map(OscArg::type_tag))
            .collect();
        write_padded_str(&mut buf, &tags)?;

        for arg in &self.args {
            match arg {
                OscArg::String(s) => write_padded_str(&mut buf, s)?,
                OscArg::Int(i) => buf.extend_from_slice(&i.to_be_bytes()),
                OscArg::Float(f) => buf.extend_from_slice(&f.to_be_bytes()),
                // The tag alone carries the value
                OscArg::Bool(_) => {}
            }
        }

        Ok(buf)
    }
}

/// NUL-terminate and pad with NULs up to the next multiple of 4.
fn write_padded_str(buf: &mut Vec<u8>, s: &str) -> Result<(), OscEncodeError> {
    if s.as_bytes().contains(&0) {
        return Err(OscEncodeError::NulInString);
    }
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
    while buf.len() % 4 != 0 {
        buf.push(0);
    }
    Ok(())
}
