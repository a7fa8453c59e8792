//! Content hashing and name-based identifiers.
//!
//! Resource packs are identified on the client by a SHA-1 digest of the
//! archive, so everything here produces lowercase, zero-padded hex strings of
//! exactly [`SHA1_HEX_LEN`] characters.

use md5::Md5;
use sha1::{Digest, Sha1};
use std::fmt::Write as _;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};
use uuid::{Builder, Uuid};

/// Size of the chunks fed into the digest while streaming.
pub const HASH_BUFFER_SIZE: usize = 8192;

/// Length of a hex encoded SHA-1 digest.
pub const SHA1_HEX_LEN: usize = 40;

/// Encodes bytes as lowercase hex, two characters per byte.
pub fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);

    for byte in bytes {
        // Writing into a String cannot fail.
        let _ = write!(out, "{byte:02x}");
    }

    out
}

/// SHA-1 of an in-memory buffer.
pub fn sha1_hex(bytes: &[u8]) -> String {
    to_hex(&Sha1::digest(bytes))
}

/// Streams a reader through SHA-1 in fixed-size chunks.
///
/// The reader is consumed until EOF and is never buffered whole.
pub async fn sha1_hex_reader<R>(mut reader: R) -> io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut hasher = Sha1::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        let read = reader.read(&mut buffer).await?;
        if read == 0 {
            break;
        }

        hasher.update(&buffer[..read]);
        total += read as u64;
    }

    tracing::trace!("Hashed {} bytes", total);
    Ok(to_hex(&hasher.finalize()))
}

/// Version 3 UUID built from the MD5 of `bytes` with no namespace prefix.
///
/// Feeding the same bytes always yields the same identifier, which lets
/// clients that cache packs by id recognise a re-delivered pack.
pub fn name_uuid_from_bytes(bytes: &[u8]) -> Uuid {
    let mut digest = [0u8; 16];
    digest.copy_from_slice(&Md5::digest(bytes));

    Builder::from_md5_bytes(digest).into_uuid()
}
