//! Records the host writes into client memory
//!
//! `DC13` (stat) and `DC18` (readdir) do not return their data in the `RETV`
//! packet. The host pushes a fixed-layout record into the window named by the
//! request through the binary transfer verbs, then sends the result. The
//! layouts are the host tool's C structures as laid out for the target, so
//! they are little-endian rather than network order.

use heapless::String;

/// Size of a host stat record
pub const HOST_STAT_SIZE: usize = 60;

/// Size of a host directory entry record
pub const HOST_DIRENT_SIZE: usize = 268;

/// Capacity of a directory entry name (without NUL)
pub const NAME_MAX: usize = 255;

/// Offset of the name within a directory entry record
const DIRENT_NAME_OFFSET: usize = 11;

/// Directory bit of `st_mode`
pub const S_IFDIR: u32 = 0o040000;

/// File status as reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HostStat {
    pub dev: u16,
    pub ino: u16,
    pub mode: u32,
    pub nlink: u16,
    pub uid: u16,
    pub gid: u16,
    pub rdev: u16,
    pub size: i32,
    pub atime: i32,
    pub mtime: i32,
    pub ctime: i32,
    pub blksize: i32,
    pub blocks: i32,
}

impl HostStat {
    /// Decode a stat record
    ///
    /// Returns `None` if `bytes` is shorter than [`HOST_STAT_SIZE`].
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HOST_STAT_SIZE {
            return None;
        }
        let u16_at = |off: usize| u16::from_le_bytes([bytes[off], bytes[off + 1]]);
        let i32_at = |off: usize| {
            i32::from_le_bytes([bytes[off], bytes[off + 1], bytes[off + 2], bytes[off + 3]])
        };

        Some(Self {
            dev: u16_at(0),
            ino: u16_at(2),
            mode: i32_at(4) as u32,
            nlink: u16_at(8),
            uid: u16_at(10),
            gid: u16_at(12),
            rdev: u16_at(14),
            size: i32_at(16),
            atime: i32_at(20),
            mtime: i32_at(28),
            ctime: i32_at(36),
            blksize: i32_at(44),
            blocks: i32_at(48),
        })
    }

    /// Encode into the host layout (spare fields zeroed)
    pub fn to_bytes(&self) -> [u8; HOST_STAT_SIZE] {
        let mut out = [0u8; HOST_STAT_SIZE];
        out[0..2].copy_from_slice(&self.dev.to_le_bytes());
        out[2..4].copy_from_slice(&self.ino.to_le_bytes());
        out[4..8].copy_from_slice(&self.mode.to_le_bytes());
        out[8..10].copy_from_slice(&self.nlink.to_le_bytes());
        out[10..12].copy_from_slice(&self.uid.to_le_bytes());
        out[12..14].copy_from_slice(&self.gid.to_le_bytes());
        out[14..16].copy_from_slice(&self.rdev.to_le_bytes());
        out[16..20].copy_from_slice(&self.size.to_le_bytes());
        out[20..24].copy_from_slice(&self.atime.to_le_bytes());
        out[28..32].copy_from_slice(&self.mtime.to_le_bytes());
        out[36..40].copy_from_slice(&self.ctime.to_le_bytes());
        out[44..48].copy_from_slice(&self.blksize.to_le_bytes());
        out[48..52].copy_from_slice(&self.blocks.to_le_bytes());
        out
    }

    /// Whether the mode carries the directory bit
    pub fn is_dir(&self) -> bool {
        self.mode & S_IFDIR != 0
    }
}

/// One directory entry as reported by the host
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HostDirent {
    pub ino: i32,
    pub off: i32,
    pub reclen: u16,
    pub d_type: u8,
    pub name: String<NAME_MAX>,
}

impl HostDirent {
    /// Decode a directory entry record
    ///
    /// The name ends at the first NUL or at the end of the name field.
    /// Returns `None` for a short record or a name that is not UTF-8.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HOST_DIRENT_SIZE {
            return None;
        }
        let raw_name = &bytes[DIRENT_NAME_OFFSET..DIRENT_NAME_OFFSET + NAME_MAX + 1];
        let name_len = raw_name.iter().position(|&b| b == 0).unwrap_or(NAME_MAX);
        let name = core::str::from_utf8(&raw_name[..name_len.min(NAME_MAX)]).ok()?;

        Some(Self {
            ino: i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            off: i32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            reclen: u16::from_le_bytes([bytes[8], bytes[9]]),
            d_type: bytes[10],
            name: String::try_from(name).ok()?,
        })
    }

    /// Encode into the host layout
    ///
    /// Names longer than [`NAME_MAX`] bytes cannot be represented.
    pub fn to_bytes(&self) -> [u8; HOST_DIRENT_SIZE] {
        let mut out = [0u8; HOST_DIRENT_SIZE];
        out[0..4].copy_from_slice(&self.ino.to_le_bytes());
        out[4..8].copy_from_slice(&self.off.to_le_bytes());
        out[8..10].copy_from_slice(&self.reclen.to_le_bytes());
        out[10] = self.d_type;
        let name = self.name.as_bytes();
        out[DIRENT_NAME_OFFSET..DIRENT_NAME_OFFSET + name.len()].copy_from_slice(name);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stat_layout() {
        let mut raw = [0u8; HOST_STAT_SIZE];
        raw[4..8].copy_from_slice(&(0o100644u32).to_le_bytes());
        raw[16..20].copy_from_slice(&1234i32.to_le_bytes());
        raw[28..32].copy_from_slice(&1_700_000_000i32.to_le_bytes());

        let stat = HostStat::from_bytes(&raw).unwrap();
        assert_eq!(stat.size, 1234);
        assert_eq!(stat.mtime, 1_700_000_000);
        assert!(!stat.is_dir());
    }

    #[test]
    fn test_stat_directory_bit() {
        let stat = HostStat {
            mode: 0o040755,
            ..Default::default()
        };
        assert!(stat.is_dir());
        assert_eq!(HostStat::from_bytes(&stat.to_bytes()), Some(stat));
    }

    #[test]
    fn test_stat_short_record() {
        assert_eq!(HostStat::from_bytes(&[0u8; HOST_STAT_SIZE - 1]), None);
    }

    #[test]
    fn test_dirent_name() {
        let mut raw = [0u8; HOST_DIRENT_SIZE];
        raw[10] = 8;
        raw[11..14].copy_from_slice(b"bar");

        let entry = HostDirent::from_bytes(&raw).unwrap();
        assert_eq!(entry.name.as_str(), "bar");
        assert_eq!(entry.d_type, 8);
    }

    #[test]
    fn test_dirent_unterminated_name() {
        let mut raw = [b'x'; HOST_DIRENT_SIZE];
        raw[..11].fill(0);
        let entry = HostDirent::from_bytes(&raw).unwrap();
        assert_eq!(entry.name.len(), NAME_MAX);
    }

    #[test]
    fn test_dirent_invalid_utf8() {
        let mut raw = [0u8; HOST_DIRENT_SIZE];
        raw[11] = 0xFF;
        assert_eq!(HostDirent::from_bytes(&raw), None);
    }
}
