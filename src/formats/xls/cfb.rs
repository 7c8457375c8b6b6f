//! Compound File Binary (OLE2) container writer, plus the directory sniff used for detection.
//!
//! Only what an XLS workbook needs: a version 3 file (512-byte sectors) holding a single stream
//! under the root storage. Streams shorter than the mini-stream cutoff are padded up to it, so
//! the mini FAT is never used.
//!
//! Sector layout: stream data, one directory sector, FAT sectors, then DIFAT sectors (only for
//! streams large enough to need more than 109 FAT sectors).

pub(crate) const MAGIC: &[u8; 8] = b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1";

const SECTOR_SIZE: usize = 512;
const HEADER_FAT_SLOTS: usize = 109;
const MINI_STREAM_CUTOFF: usize = 4096;
const DIRENTRY_SIZE: usize = 128;

const DIFSECT: u32 = 0xFFFF_FFFC;
const FATSECT: u32 = 0xFFFF_FFFD;
const ENDOFCHAIN: u32 = 0xFFFF_FFFE;
const FREESECT: u32 = 0xFFFF_FFFF;
const NOSTREAM: u32 = 0xFFFF_FFFF;

const STGTY_EMPTY: u8 = 0;
const STGTY_STREAM: u8 = 2;
const STGTY_ROOT: u8 = 5;
const COLOR_BLACK: u8 = 1;

const IDS_PER_SECTOR: usize = SECTOR_SIZE / 4;
const IDS_PER_DIFAT_SECTOR: usize = IDS_PER_SECTOR - 1;

/// Build a compound file containing one stream named `name` (at most 31 UTF-16 units).
pub(crate) fn write_single_stream(name: &str, data: &[u8]) -> Vec<u8> {
    let stream_size = data.len().max(MINI_STREAM_CUTOFF);
    let data_sectors = stream_size.div_ceil(SECTOR_SIZE);
    let dir_sector = data_sectors;

    let (n_fat, n_difat) = fat_layout(data_sectors + 1);
    let fat_start = dir_sector + 1;
    let difat_start = fat_start + n_fat;
    let fat_ids: Vec<u32> = (fat_start..fat_start + n_fat).map(|s| s as u32).collect();

    let mut out = Vec::with_capacity((1 + difat_start + n_difat) * SECTOR_SIZE);
    out.extend_from_slice(&header(dir_sector as u32, &fat_ids, difat_start as u32, n_difat as u32));

    out.extend_from_slice(data);
    out.resize(SECTOR_SIZE + data_sectors * SECTOR_SIZE, 0);

    out.extend_from_slice(&directory(name, stream_size as u32));

    // FAT
    let mut fat = Vec::with_capacity(n_fat * IDS_PER_SECTOR);
    fat.extend((1..data_sectors).map(|next| next as u32));
    fat.push(ENDOFCHAIN); // last data sector
    fat.push(ENDOFCHAIN); // directory
    fat.extend(std::iter::repeat_n(FATSECT, n_fat));
    fat.extend(std::iter::repeat_n(DIFSECT, n_difat));
    fat.resize(n_fat * IDS_PER_SECTOR, FREESECT);
    for id in fat {
        out.extend_from_slice(&id.to_le_bytes());
    }

    // DIFAT: FAT sector ids beyond the 109 kept in the header, chained through the last slot.
    let overflow = fat_ids.get(HEADER_FAT_SLOTS..).unwrap_or_default();
    for (i, chunk) in overflow.chunks(IDS_PER_DIFAT_SECTOR).enumerate() {
        let mut ids = chunk.to_vec();
        ids.resize(IDS_PER_DIFAT_SECTOR, FREESECT);
        let next = if i + 1 < n_difat {
            (difat_start + i + 1) as u32
        } else {
            ENDOFCHAIN
        };
        ids.push(next);
        for id in ids {
            out.extend_from_slice(&id.to_le_bytes());
        }
    }

    out
}

/// Number of FAT and DIFAT sectors needed to describe `used` sectors plus themselves.
fn fat_layout(used: usize) -> (usize, usize) {
    let mut n_fat = 0;
    let mut n_difat = 0;
    loop {
        let new_fat = (used + n_fat + n_difat).div_ceil(IDS_PER_SECTOR);
        let new_difat = new_fat
            .saturating_sub(HEADER_FAT_SLOTS)
            .div_ceil(IDS_PER_DIFAT_SECTOR);
        if new_fat == n_fat && new_difat == n_difat {
            return (n_fat, n_difat);
        }
        n_fat = new_fat;
        n_difat = new_difat;
    }
}

fn header(first_dir_sector: u32, fat_ids: &[u32], first_difat_sector: u32, n_difat: u32) -> [u8; SECTOR_SIZE] {
    let mut h = [0u8; SECTOR_SIZE];
    h[0..8].copy_from_slice(MAGIC);
    h[24..26].copy_from_slice(&0x003Eu16.to_le_bytes()); // minor version
    h[26..28].copy_from_slice(&3u16.to_le_bytes()); // major version
    h[28..30].copy_from_slice(&0xFFFEu16.to_le_bytes()); // little-endian
    h[30..32].copy_from_slice(&9u16.to_le_bytes()); // 512-byte sectors
    h[32..34].copy_from_slice(&6u16.to_le_bytes()); // 64-byte mini sectors
    // 40..44: directory sector count, always 0 for version 3
    h[44..48].copy_from_slice(&(fat_ids.len() as u32).to_le_bytes());
    h[48..52].copy_from_slice(&first_dir_sector.to_le_bytes());
    h[56..60].copy_from_slice(&(MINI_STREAM_CUTOFF as u32).to_le_bytes());
    h[60..64].copy_from_slice(&ENDOFCHAIN.to_le_bytes()); // no mini FAT
    let difat_start = if n_difat > 0 { first_difat_sector } else { ENDOFCHAIN };
    h[68..72].copy_from_slice(&difat_start.to_le_bytes());
    h[72..76].copy_from_slice(&n_difat.to_le_bytes());
    for slot in 0..HEADER_FAT_SLOTS {
        let id = fat_ids.get(slot).copied().unwrap_or(FREESECT);
        let off = 76 + slot * 4;
        h[off..off + 4].copy_from_slice(&id.to_le_bytes());
    }
    h
}

/// Root entry, the stream entry and two unused entries: exactly one sector.
fn directory(name: &str, stream_size: u32) -> Vec<u8> {
    let mut dir = Vec::with_capacity(SECTOR_SIZE);
    dir.extend_from_slice(&dir_entry("Root Entry", STGTY_ROOT, 1, ENDOFCHAIN, 0));
    dir.extend_from_slice(&dir_entry(name, STGTY_STREAM, NOSTREAM, 0, stream_size));
    dir.extend_from_slice(&dir_entry("", STGTY_EMPTY, NOSTREAM, 0, 0));
    dir.extend_from_slice(&dir_entry("", STGTY_EMPTY, NOSTREAM, 0, 0));
    dir
}

fn dir_entry(name: &str, entry_type: u8, child: u32, start_sector: u32, size: u32) -> [u8; DIRENTRY_SIZE] {
    let mut e = [0u8; DIRENTRY_SIZE];
    let units: Vec<u16> = name.encode_utf16().take(31).collect();
    for (i, unit) in units.iter().enumerate() {
        e[i * 2..i * 2 + 2].copy_from_slice(&unit.to_le_bytes());
    }
    let name_len = if units.is_empty() { 0 } else { (units.len() as u16 + 1) * 2 };
    e[64..66].copy_from_slice(&name_len.to_le_bytes());
    e[66] = entry_type;
    e[67] = if entry_type == STGTY_EMPTY { 0 } else { COLOR_BLACK };
    e[68..72].copy_from_slice(&NOSTREAM.to_le_bytes()); // left sibling
    e[72..76].copy_from_slice(&NOSTREAM.to_le_bytes()); // right sibling
    e[76..80].copy_from_slice(&child.to_le_bytes());
    e[116..120].copy_from_slice(&start_sector.to_le_bytes());
    e[120..124].copy_from_slice(&size.to_le_bytes());
    e
}

/// Whether `raw` is a compound file whose directory holds a `Workbook` (or BIFF5 `Book`)
/// stream. Only directory entry names are compared, never stream content.
pub(crate) fn looks_like_workbook(raw: &[u8]) -> bool {
    if !raw.starts_with(MAGIC) {
        return false;
    }
    let sector_size = match read_u16(raw, 30) {
        Some(9) => 512,
        Some(12) => 4096,
        _ => return false,
    };
    let Some(mut sector) = read_u32(raw, 48) else {
        return false;
    };

    // Bounded by the sector count so a cyclic chain cannot loop forever.
    for _ in 0..raw.len() / sector_size {
        if sector >= DIFSECT {
            break;
        }
        let start = (sector as usize + 1) * sector_size;
        let Some(entries) = raw.get(start..start + sector_size) else {
            return false;
        };
        if entries.chunks_exact(DIRENTRY_SIZE).any(is_workbook_entry) {
            return true;
        }
        match next_sector(raw, sector_size, sector) {
            Some(next) => sector = next,
            None => break,
        }
    }
    false
}

fn is_workbook_entry(entry: &[u8]) -> bool {
    if entry[66] != STGTY_STREAM {
        return false;
    }
    let name_len = usize::from(u16::from_le_bytes([entry[64], entry[65]])).min(64);
    let units: Vec<u16> = entry[..name_len]
        .chunks_exact(2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .take_while(|&u| u != 0)
        .collect();
    let name = String::from_utf16_lossy(&units);
    name.eq_ignore_ascii_case("Workbook") || name.eq_ignore_ascii_case("Book")
}

/// Follow the FAT chain one step. Only the FAT sectors listed in the header are consulted.
fn next_sector(raw: &[u8], sector_size: usize, sector: u32) -> Option<u32> {
    let per_fat_sector = sector_size / 4;
    let slot = sector as usize / per_fat_sector;
    if slot >= HEADER_FAT_SLOTS {
        return None;
    }
    let fat_sector = read_u32(raw, 76 + slot * 4)?;
    if fat_sector >= DIFSECT {
        return None;
    }
    read_u32(raw, (fat_sector as usize + 1) * sector_size + (sector as usize % per_fat_sector) * 4)
}

fn read_u16(raw: &[u8], off: usize) -> Option<u16> {
    Some(u16::from_le_bytes(raw.get(off..off + 2)?.try_into().ok()?))
}

fn read_u32(raw: &[u8], off: usize) -> Option<u32> {
    Some(u32::from_le_bytes(raw.get(off..off + 4)?.try_into().ok()?))
}
