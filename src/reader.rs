//! MaxMind DB reader
//!
//! A [`Reader`] owns a memory-mapped view of one `.mmdb` file. Opening only
//! parses the metadata block; the search tree and data section are read in
//! place, one node and one record at a time, on each lookup.
//!
//! # Examples
//!
//! ```no_run
//! use geolookup::Reader;
//!
//! let reader = Reader::open("/tmp/country.mmdb")?;
//! if let Some(record) = reader.lookup_str("8.8.8.8")? {
//!     println!("{:?} (/{})", record.data, record.prefix_len);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::data_section::{DataDecoder, DataValue};
use crate::mmdb::{IpVersion, Metadata, MmdbError, MmdbHeader, SearchTree};
use memmap2::Mmap;
use std::fmt;
use std::fs::File;
use std::io;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from opening or querying a database file
#[derive(Debug, Error)]
pub enum ReaderError {
    /// The file could not be opened or mapped
    #[error("Failed to open {}: {source}", path.display())]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
    /// The file is not a valid MMDB file, or a record is corrupt
    #[error(transparent)]
    Format(#[from] MmdbError),
    /// The query text is not an IP address
    #[error("Invalid IP address: {0}")]
    InvalidIpAddress(String),
}

impl ReaderError {
    /// True when the file simply does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, ReaderError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

/// Record found for an address
#[derive(Debug, Clone, PartialEq)]
pub struct LookupRecord {
    /// Decoded record
    pub data: DataValue,
    /// Prefix length of the matching network
    pub prefix_len: u8,
}

/// Storage for database data - either owned or memory-mapped
enum ReaderStorage {
    Owned(Vec<u8>),
    Mmap(Mmap),
}

impl ReaderStorage {
    fn as_slice(&self) -> &[u8] {
        match self {
            ReaderStorage::Owned(v) => v.as_slice(),
            ReaderStorage::Mmap(m) => &m[..],
        }
    }
}

/// An open MaxMind DB file
///
/// `Reader` is `Send + Sync`; lookups take `&self` and touch no shared
/// mutable state, so one instance can serve any number of threads.
pub struct Reader {
    data: ReaderStorage,
    header: MmdbHeader,
    /// Record where IPv4 lookups begin (see [`SearchTree::ipv4_start`])
    ipv4_start: u32,
    path: Option<PathBuf>,
}

impl Reader {
    /// Open a database file using memory mapping
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ReaderError> {
        let path = path.as_ref();
        let io_err = |source| ReaderError::Io {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(io_err)?;
        // SAFETY: the mapping is read-only and owned by the Reader. Database
        // files are replaced by rename, never rewritten in place.
        let mmap = unsafe { Mmap::map(&file) }.map_err(io_err)?;

        Self::from_storage(ReaderStorage::Mmap(mmap), Some(path.to_path_buf()))
    }

    /// Create a reader over an in-memory copy of a database
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, ReaderError> {
        Self::from_storage(ReaderStorage::Owned(data), None)
    }

    fn from_storage(storage: ReaderStorage, path: Option<PathBuf>) -> Result<Self, ReaderError> {
        let data = storage.as_slice();
        let header = MmdbHeader::from_file(data)?;
        let ipv4_start = SearchTree::new(data, &header).ipv4_start()?;

        Ok(Self {
            data: storage,
            header,
            ipv4_start,
            path,
        })
    }

    /// Look up an IP address
    ///
    /// IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`) are looked up as their
    /// IPv4 address. Other IPv6 addresses are never found in an IPv4-only
    /// database.
    pub fn lookup(&self, addr: IpAddr) -> Result<Option<LookupRecord>, ReaderError> {
        let tree = SearchTree::new(self.data.as_slice(), &self.header);

        let found = match addr {
            IpAddr::V4(v4) => tree.lookup_v4(v4, self.ipv4_start)?,
            IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                Some(v4) => tree.lookup_v4(v4, self.ipv4_start)?,
                None if self.header.ip_version == IpVersion::V4 => None,
                None => tree.lookup_v6(v6)?,
            },
        };

        match found {
            Some(result) => Ok(Some(LookupRecord {
                data: self.decode_data(result.data_offset)?,
                prefix_len: result.prefix_len,
            })),
            None => Ok(None),
        }
    }

    /// Parse `query` as an IP address and look it up
    pub fn lookup_str(&self, query: &str) -> Result<Option<LookupRecord>, ReaderError> {
        let addr: IpAddr = query
            .parse()
            .map_err(|_| ReaderError::InvalidIpAddress(query.to_string()))?;
        self.lookup(addr)
    }

    /// Decode the full metadata block
    pub fn metadata(&self) -> Result<Metadata, ReaderError> {
        Ok(Metadata::from_file(self.data.as_slice())?)
    }

    /// Parsed header
    pub fn header(&self) -> &MmdbHeader {
        &self.header
    }

    /// Path the reader was opened from, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Size of the underlying file in bytes
    pub fn size(&self) -> usize {
        self.data.as_slice().len()
    }

    /// Decode the record at `offset`, relative to the data section start
    fn decode_data(&self, offset: u32) -> Result<DataValue, ReaderError> {
        let data_section =
            &self.data.as_slice()[self.header.data_section_start..self.header.metadata_start];

        DataDecoder::new(data_section, 0)
            .decode(offset)
            .map_err(|e| ReaderError::Format(MmdbError::DecodeError(e.to_string())))
    }
}

impl fmt::Debug for Reader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reader")
            .field("path", &self.path)
            .field("size", &self.size())
            .field("header", &self.header)
            .finish()
    }
}
