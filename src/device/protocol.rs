//! RouterOS API wire format.
//!
//! A sentence is a sequence of length-prefixed words terminated by an empty
//! word. Word lengths use a variable-width big-endian encoding:
//!
//! ```text
//! len < 0x80        1 byte   0xxxxxxx
//! len < 0x4000      2 bytes  10xxxxxx ...
//! len < 0x200000    3 bytes  110xxxxx ...
//! len < 0x10000000  4 bytes  1110xxxx ...
//! otherwise         5 bytes  11110000 + u32
//! ```

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on a single incoming word (16 MB)
const MAX_WORD_LEN: usize = 16 * 1024 * 1024;

/// Append the encoded length prefix for a word of `len` bytes
pub fn encode_length(len: usize, out: &mut Vec<u8>) {
    let len = len as u32;
    if len < 0x80 {
        out.push(len as u8);
    } else if len < 0x4000 {
        out.extend_from_slice(&(len | 0x8000).to_be_bytes()[2..]);
    } else if len < 0x20_0000 {
        out.extend_from_slice(&(len | 0xC0_0000).to_be_bytes()[1..]);
    } else if len < 0x1000_0000 {
        out.extend_from_slice(&(len | 0xE000_0000).to_be_bytes());
    } else {
        out.push(0xF0);
        out.extend_from_slice(&len.to_be_bytes());
    }
}

/// Encode a full sentence including the terminating empty word
pub fn encode_sentence<S: AsRef<str>>(words: &[S]) -> Vec<u8> {
    let mut out = Vec::with_capacity(words.iter().map(|w| w.as_ref().len() + 2).sum::<usize>() + 1);
    for word in words {
        let bytes = word.as_ref().as_bytes();
        encode_length(bytes.len(), &mut out);
        out.extend_from_slice(bytes);
    }
    out.push(0);
    out
}

/// Read one word length prefix
pub async fn read_length<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<usize> {
    let first = reader.read_u8().await?;

    let (extra, initial) = if first & 0x80 == 0 {
        (0, u32::from(first))
    } else if first & 0xC0 == 0x80 {
        (1, u32::from(first & 0x3F))
    } else if first & 0xE0 == 0xC0 {
        (2, u32::from(first & 0x1F))
    } else if first & 0xF0 == 0xE0 {
        (3, u32::from(first & 0x0F))
    } else if first == 0xF0 {
        (4, 0)
    } else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("invalid word length prefix 0x{:02X}", first),
        ));
    };

    let mut len = initial;
    for _ in 0..extra {
        len = (len << 8) | u32::from(reader.read_u8().await?);
    }
    Ok(len as usize)
}

/// Read one word; `None` for the empty sentence terminator
pub async fn read_word<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Option<String>> {
    let len = read_length(reader).await?;
    if len == 0 {
        return Ok(None);
    }
    if len > MAX_WORD_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("word of {} bytes exceeds limit of {} bytes", len, MAX_WORD_LEN),
        ));
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

/// Read words up to and excluding the sentence terminator
pub async fn read_sentence<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Vec<String>> {
    let mut words = Vec::new();
    while let Some(word) = read_word(reader).await? {
        words.push(word);
    }
    Ok(words)
}

/// Write a sentence and flush it
pub async fn write_sentence<W, S>(writer: &mut W, words: &[S]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    S: AsRef<str>,
{
    writer.write_all(&encode_sentence(words)).await?;
    writer.flush().await
}

/// Reply type, from the first word of a reply sentence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// `!re` - one data row
    Re,
    /// `!done` - end of the command's replies
    Done,
    /// `!trap` - the command failed
    Trap,
    /// `!fatal` - the device is closing the connection
    Fatal,
    /// `!empty` - no data rows (RouterOS 7.18+)
    Empty,
}

impl ReplyKind {
    fn parse(word: &str) -> Option<Self> {
        match word {
            "!re" => Some(Self::Re),
            "!done" => Some(Self::Done),
            "!trap" => Some(Self::Trap),
            "!fatal" => Some(Self::Fatal),
            "!empty" => Some(Self::Empty),
            _ => None,
        }
    }
}

/// A parsed reply sentence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub kind: ReplyKind,
    /// `=key=value` attributes in arrival order
    pub attributes: Vec<(String, String)>,
    /// Bare words after the reply type (`!fatal` carries its reason this way)
    pub extra: Vec<String>,
}

impl Reply {
    /// Parse a reply sentence
    pub fn parse(words: Vec<String>) -> io::Result<Self> {
        let mut iter = words.into_iter();
        let head = iter
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "empty reply sentence"))?;
        let kind = ReplyKind::parse(&head).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown reply type '{}'", head),
            )
        })?;

        let mut attributes = Vec::new();
        let mut extra = Vec::new();
        for word in iter {
            if let Some(rest) = word.strip_prefix('=') {
                let (key, value) = rest.split_once('=').unwrap_or((rest, ""));
                attributes.push((key.to_string(), value.to_string()));
            } else if word.starts_with(".tag=") {
                // Tagged commands are not used
                continue;
            } else {
                extra.push(word);
            }
        }

        Ok(Self {
            kind,
            attributes,
            extra,
        })
    }

    /// First value of attribute `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Human-readable error text for `!trap` and `!fatal`
    pub fn message(&self) -> String {
        self.get("message")
            .map(str::to_string)
            .or_else(|| self.extra.first().cloned())
            .unwrap_or_else(|| "no message".to_string())
    }
}
