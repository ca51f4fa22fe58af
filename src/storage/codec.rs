//! Metadata codec
//!
//! Encoding and decoding of the free list and index files.
//!
//! ## File Formats
//!
//! All integers are big-endian int32. Strings are a u16 byte length followed
//! by UTF-8 bytes. There is no header, checksum or compression: a file is
//! decoded front to back in one pass.
//!
//! ### Block
//! ```text
//! ┌──────────┬───────────────┬────────────┬──────────┐
//! │ NameLen  │  Name (utf-8) │ Offset (4) │ Size (4) │
//! │   (2)    │               │            │          │
//! └──────────┴───────────────┴────────────┴──────────┘
//! ```
//!
//! ### Free list file (`emptyBlocks`)
//! ```text
//! Count (4) | Block × Count
//! ```
//!
//! ### Index file (`index`)
//! ```text
//! EntryCount (4) | { KeyLen (4) | Key | BlockCount (4) | Block × BlockCount } × EntryCount
//! ```

use std::collections::{HashMap, VecDeque};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use super::{BlockLocation, Key};

/// Upper bound on speculative `Vec` preallocation while decoding counts
const MAX_PREALLOC: usize = 1024;

// =============================================================================
// Primitive Helpers
// =============================================================================

fn invalid(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

fn write_len<W: Write>(writer: &mut W, len: usize, what: &str) -> io::Result<()> {
    let len = i32::try_from(len)
        .map_err(|_| invalid(format!("{} {} does not fit in int32", what, len)))?;
    writer.write_i32::<BigEndian>(len)
}

fn read_len<R: Read>(reader: &mut R, what: &str) -> io::Result<usize> {
    let len = reader.read_i32::<BigEndian>()?;
    usize::try_from(len).map_err(|_| invalid(format!("negative {}: {}", what, len)))
}

fn write_u31<W: Write>(writer: &mut W, value: u32, what: &str) -> io::Result<()> {
    let value = i32::try_from(value)
        .map_err(|_| invalid(format!("{} {} does not fit in int32", what, value)))?;
    writer.write_i32::<BigEndian>(value)
}

fn read_u31<R: Read>(reader: &mut R, what: &str) -> io::Result<u32> {
    let value = reader.read_i32::<BigEndian>()?;
    u32::try_from(value).map_err(|_| invalid(format!("negative {}: {}", what, value)))
}

fn write_name<W: Write>(writer: &mut W, name: &str) -> io::Result<()> {
    let len = u16::try_from(name.len())
        .map_err(|_| invalid(format!("file name too long: {} bytes", name.len())))?;
    writer.write_u16::<BigEndian>(len)?;
    writer.write_all(name.as_bytes())
}

fn read_name<R: Read>(reader: &mut R) -> io::Result<String> {
    let len = reader.read_u16::<BigEndian>()? as usize;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    let name =
        String::from_utf8(buf).map_err(|e| invalid(format!("file name is not utf-8: {}", e)))?;
    if !is_plain_file_name(&name) {
        return Err(invalid(format!("file name escapes working directory: {:?}", name)));
    }
    Ok(name)
}

/// A single path component inside the working directory
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

// =============================================================================
// Block Lists
// =============================================================================

/// Write `count` followed by each block
pub fn write_blocks<'a, W, I>(writer: &mut W, blocks: I) -> io::Result<()>
where
    W: Write,
    I: ExactSizeIterator<Item = &'a BlockLocation>,
{
    write_len(writer, blocks.len(), "block count")?;
    for block in blocks {
        write_name(writer, &block.file_name)?;
        write_u31(writer, block.offset, "block offset")?;
        write_u31(writer, block.size, "block size")?;
    }
    Ok(())
}

/// Read a count-prefixed block list
pub fn read_blocks<R: Read>(reader: &mut R) -> io::Result<Vec<BlockLocation>> {
    let count = read_len(reader, "block count")?;
    let mut blocks = Vec::with_capacity(count.min(MAX_PREALLOC));
    for _ in 0..count {
        let file_name = read_name(reader)?;
        let offset = read_u31(reader, "block offset")?;
        let size = read_u31(reader, "block size")?;
        blocks.push(BlockLocation {
            file_name,
            offset,
            size,
        });
    }
    Ok(blocks)
}

// =============================================================================
// Free List
// =============================================================================

pub fn write_free_list<W: Write>(writer: &mut W, free: &VecDeque<BlockLocation>) -> io::Result<()> {
    write_blocks(writer, free.iter())
}

pub fn read_free_list<R: Read>(reader: &mut R) -> io::Result<VecDeque<BlockLocation>> {
    Ok(read_blocks(reader)?.into())
}

// =============================================================================
// Index
// =============================================================================

pub fn write_index<W: Write>(
    writer: &mut W,
    index: &HashMap<Key, Vec<BlockLocation>>,
) -> io::Result<()> {
    write_len(writer, index.len(), "entry count")?;
    for (key, blocks) in index {
        write_len(writer, key.len(), "key length")?;
        writer.write_all(key)?;
        write_blocks(writer, blocks.iter())?;
    }
    Ok(())
}

pub fn read_index<R: Read>(reader: &mut R) -> io::Result<HashMap<Key, Vec<BlockLocation>>> {
    let count = read_len(reader, "entry count")?;
    let mut index = HashMap::with_capacity(count.min(MAX_PREALLOC));
    for _ in 0..count {
        let key_len = read_len(reader, "key length")?;
        let mut key = Vec::with_capacity(key_len.min(MAX_PREALLOC));
        reader.by_ref().take(key_len as u64).read_to_end(&mut key)?;
        if key.len() != key_len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("truncated key: expected {} bytes, got {}", key_len, key.len()),
            ));
        }
        let blocks = read_blocks(reader)?;
        index.insert(Key::from(key), blocks);
    }
    Ok(index)
}

// =============================================================================
// Files
// =============================================================================

/// Write a metadata file via `<path>.tmp` + fsync + rename, so a crash in the
/// middle of a save never leaves a half-written file under the real name.
pub fn save_atomic<F>(path: &Path, encode: F) -> io::Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");

    let mut writer = BufWriter::new(File::create(&tmp)?);
    encode(&mut writer)?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp, path)
}

/// Decode a metadata file, or `None` if it does not exist yet
pub fn load_if_exists<T, F>(path: &Path, decode: F) -> io::Result<Option<T>>
where
    F: FnOnce(&mut BufReader<File>) -> io::Result<T>,
{
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let mut reader = BufReader::new(file);
    decode(&mut reader).map(Some)
}
