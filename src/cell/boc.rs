//! Bag of Cells (BoC) serialization and deserialization
//!
//! BoC is a serialization format that encodes a DAG of cells into a byte
//! array. Cells are written root first, every reference points to a cell
//! with a larger index, and identical subtrees are stored once.

use crate::cell::cell::{Cell, CellType};
use crate::crc::CRC32C;
use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use byteorder::{BigEndian, ByteOrder};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// BoC magic number for standard format
const BOC_GENERIC_MAGIC: u32 = 0xb5ee9c72;

/// Legacy indexed format
const BOC_INDEXED_MAGIC: u32 = 0x68ff65f3;

/// Legacy indexed format followed by a CRC32C
const BOC_INDEXED_CRC32C_MAGIC: u32 = 0xacc3a728;

/// Serializes a cell and its references into a Bag of Cells (BoC) format
pub fn serialize_boc(root: &Arc<Cell>, has_crc32: bool) -> Result<Vec<u8>> {
    serialize_boc_roots(std::slice::from_ref(root), has_crc32)
}

/// Serializes several roots sharing one cell table
pub fn serialize_boc_roots(roots: &[Arc<Cell>], has_crc32: bool) -> Result<Vec<u8>> {
    if roots.is_empty() {
        bail!("BoC must have at least one root");
    }

    let (cells, index) = collect_cells(roots);
    let size_bytes = bytes_needed(cells.len());

    let mut serialized_cells = Vec::new();
    for cell in &cells {
        serialize_cell(cell, &index, size_bytes, &mut serialized_cells)?;
    }
    let offset_bytes = bytes_needed(serialized_cells.len());

    let mut result = Vec::with_capacity(serialized_cells.len() + 32);
    result.extend_from_slice(&BOC_GENERIC_MAGIC.to_be_bytes());

    // has_idx = 0, has_cache_bits = 0, flags = 0
    let has_crc32_flag = if has_crc32 { 1u8 } else { 0u8 };
    result.push((has_crc32_flag << 6) | size_bytes as u8);
    result.push(offset_bytes as u8);

    write_uint(&mut result, cells.len(), size_bytes);
    write_uint(&mut result, roots.len(), size_bytes);
    // Number of absent cells (always 0)
    write_uint(&mut result, 0, size_bytes);
    write_uint(&mut result, serialized_cells.len(), offset_bytes);

    for root in roots {
        let root_index = index
            .get(&root.hash())
            .context("root cell not found in collected cells")?;
        write_uint(&mut result, *root_index, size_bytes);
    }

    result.extend_from_slice(&serialized_cells);

    if has_crc32 {
        let crc = CRC32C.checksum(&result);
        result.extend_from_slice(&crc.to_le_bytes());
    }

    log::trace!(
        "serialized BoC: {} cells, {} roots, {} bytes",
        cells.len(),
        roots.len(),
        result.len()
    );
    Ok(result)
}

/// Deserializes a Bag of Cells (BoC) and returns its first root
pub fn deserialize_boc(data: &[u8]) -> Result<Arc<Cell>> {
    deserialize_boc_roots(data)?
        .into_iter()
        .next()
        .context("BoC has no roots")
}

/// Deserializes a Bag of Cells (BoC) and returns every root
pub fn deserialize_boc_roots(data: &[u8]) -> Result<Vec<Arc<Cell>>> {
    if data.len() < 4 {
        bail!("BoC data too short");
    }

    let magic = BigEndian::read_u32(&data[..4]);
    let roots = match magic {
        BOC_GENERIC_MAGIC => deserialize_boc_generic(data)?,
        BOC_INDEXED_MAGIC => deserialize_boc_indexed(data, false)?,
        BOC_INDEXED_CRC32C_MAGIC => deserialize_boc_indexed(data, true)?,
        _ => bail!("Invalid BoC magic number: 0x{:08x}", magic),
    };
    Ok(roots)
}

/// Layout parameters shared by all BoC variants
struct BocHeader {
    has_idx: bool,
    has_crc32: bool,
    size_bytes: usize,
    offset_bytes: usize,
    cells_count: usize,
    root_indices: Vec<usize>,
    cells_size: usize,
}

fn deserialize_boc_generic(data: &[u8]) -> Result<Vec<Arc<Cell>>> {
    let mut pos = 4;

    let flags_and_size = read_byte(data, &mut pos)?;
    let has_idx = (flags_and_size & 0x80) != 0;
    let has_crc32 = (flags_and_size & 0x40) != 0;
    let size_bytes = (flags_and_size & 0x07) as usize;

    let header = read_header(data, &mut pos, has_idx, has_crc32, size_bytes, true)?;
    parse_body(data, pos, &header)
}

fn deserialize_boc_indexed(data: &[u8], has_crc32: bool) -> Result<Vec<Arc<Cell>>> {
    let mut pos = 4;
    let size_bytes = read_byte(data, &mut pos)? as usize;
    let header = read_header(data, &mut pos, true, has_crc32, size_bytes, false)?;
    parse_body(data, pos, &header)
}

fn read_header(
    data: &[u8],
    pos: &mut usize,
    has_idx: bool,
    has_crc32: bool,
    size_bytes: usize,
    has_root_list: bool,
) -> Result<BocHeader> {
    if size_bytes == 0 || size_bytes > 4 {
        bail!("Invalid size_bytes: {}", size_bytes);
    }

    let offset_bytes = read_byte(data, pos)? as usize;
    if offset_bytes == 0 || offset_bytes > 8 {
        bail!("Invalid offset_bytes: {}", offset_bytes);
    }

    let cells_count = read_uint(data, pos, size_bytes)?;
    let roots_count = read_uint(data, pos, size_bytes)?;
    let absent_count = read_uint(data, pos, size_bytes)?;
    let cells_size = read_uint(data, pos, offset_bytes)?;

    if roots_count == 0 {
        bail!("BoC has no roots");
    }
    if roots_count + absent_count > cells_count {
        bail!(
            "Invalid BoC header: {} roots and {} absent cells with {} cells",
            roots_count,
            absent_count,
            cells_count
        );
    }

    let root_indices = if has_root_list {
        let mut indices = Vec::with_capacity(roots_count);
        for _ in 0..roots_count {
            let index = read_uint(data, pos, size_bytes)?;
            if index >= cells_count {
                bail!("Invalid root index: {}", index);
            }
            indices.push(index);
        }
        indices
    } else {
        (0..roots_count).collect()
    };

    Ok(BocHeader {
        has_idx,
        has_crc32,
        size_bytes,
        offset_bytes,
        cells_count,
        root_indices,
        cells_size,
    })
}

fn parse_body(data: &[u8], mut pos: usize, header: &BocHeader) -> Result<Vec<Arc<Cell>>> {
    if header.has_idx {
        let index_len = header
            .cells_count
            .checked_mul(header.offset_bytes)
            .context("BoC index size overflows")?;
        take(data, &mut pos, index_len)?;
    }

    let cells_data = take(data, &mut pos, header.cells_size)?;

    if header.has_crc32 {
        let crc_bytes = take(data, &mut pos, 4)?;
        let expected_crc = byteorder::LittleEndian::read_u32(crc_bytes);
        let actual_crc = CRC32C.checksum(&data[..pos - 4]);
        if expected_crc != actual_crc {
            bail!(
                "CRC32C mismatch: expected 0x{:08x}, got 0x{:08x}",
                expected_crc,
                actual_crc
            );
        }
    }
    if pos != data.len() {
        log::debug!("ignoring {} trailing bytes after BoC", data.len() - pos);
    }

    let cells = parse_cells(cells_data, header.cells_count, header.size_bytes)?;
    log::trace!(
        "deserialized BoC: {} cells, {} roots",
        cells.len(),
        header.root_indices.len()
    );

    Ok(header
        .root_indices
        .iter()
        .map(|&index| cells[index].clone())
        .collect())
}

/// A cell as stored in the BoC, with references still given as indices
struct RawCell {
    cell_type: CellType,
    data: Vec<u8>,
    bit_len: usize,
    level_mask: u8,
    refs: Vec<usize>,
}

fn parse_cells(data: &[u8], count: usize, size_bytes: usize) -> Result<Vec<Arc<Cell>>> {
    let mut raw_cells = Vec::with_capacity(count);
    let mut pos = 0;

    for index in 0..count {
        let d1 = read_byte(data, &mut pos)?;
        let d2 = read_byte(data, &mut pos)?;

        let ref_count = (d1 & 0x07) as usize;
        let is_exotic = (d1 & 0x08) != 0;
        let with_hashes = (d1 & 0x10) != 0;
        let level_mask = d1 >> 5;

        if ref_count > 4 {
            bail!("Cell {} has invalid reference count {}", index, ref_count);
        }

        if with_hashes {
            let hashes_count = level_mask.count_ones() as usize + 1;
            take(data, &mut pos, hashes_count * (32 + 2))?;
        }

        // d2 = floor(b/8) + ceil(b/8): odd values mean the last byte carries a completion tag
        let data_size = (d2 as usize).div_ceil(2);
        let cell_data = take(data, &mut pos, data_size)?.to_vec();
        let bit_len = if d2 % 2 == 0 {
            data_size * 8
        } else {
            let last_byte = cell_data[data_size - 1];
            if last_byte == 0 {
                bail!("Cell {} has no completion tag", index);
            }
            data_size * 8 - last_byte.trailing_zeros() as usize - 1
        };

        let mut refs = Vec::with_capacity(ref_count);
        for _ in 0..ref_count {
            let ref_index = read_uint(data, &mut pos, size_bytes)?;
            if ref_index <= index || ref_index >= count {
                bail!(
                    "Cell {} refers to cell {} which breaks topological order",
                    index,
                    ref_index
                );
            }
            refs.push(ref_index);
        }

        let cell_type = if is_exotic {
            let tag = cell_data.first().copied().unwrap_or(0);
            CellType::from_exotic_tag(tag)
                .with_context(|| format!("Cell {} has unknown exotic type {}", index, tag))?
        } else {
            CellType::Ordinary
        };

        raw_cells.push(RawCell {
            cell_type,
            data: cell_data,
            bit_len,
            level_mask,
            refs,
        });
    }

    if pos != data.len() {
        bail!("Cells data has {} unused bytes", data.len() - pos);
    }

    // References always point forward, so build from the back
    let mut cells: Vec<Option<Arc<Cell>>> = vec![None; count];
    for (index, raw) in raw_cells.into_iter().enumerate().rev() {
        let mut references = Vec::with_capacity(raw.refs.len());
        for ref_index in raw.refs {
            let reference = cells[ref_index]
                .clone()
                .context("reference to a cell that was not built")?;
            references.push(reference);
        }

        let cell = Cell::from_parts(raw.cell_type, raw.data, raw.bit_len, references)
            .with_context(|| format!("Invalid cell {}", index))?;
        if cell.level_mask() != raw.level_mask {
            bail!(
                "Cell {} has level mask {} but its contents imply {}",
                index,
                raw.level_mask,
                cell.level_mask()
            );
        }
        cells[index] = Some(Arc::new(cell));
    }

    cells
        .into_iter()
        .map(|cell| cell.context("cell was not built"))
        .collect()
}

fn serialize_cell(
    cell: &Arc<Cell>,
    index: &HashMap<[u8; 32], usize>,
    size_bytes: usize,
    out: &mut Vec<u8>,
) -> Result<()> {
    out.extend_from_slice(&cell.descriptors());
    out.extend_from_slice(&cell.serialize_data());

    for reference in cell.references() {
        let ref_index = index
            .get(&reference.hash())
            .context("Reference not found in cell map")?;
        write_uint(out, *ref_index, size_bytes);
    }

    Ok(())
}

/// Orders the cells so that every cell precedes the cells it references,
/// with the roots first. Identical cells are kept once.
fn collect_cells(roots: &[Arc<Cell>]) -> (Vec<Arc<Cell>>, HashMap<[u8; 32], usize>) {
    let mut visited = HashSet::new();
    let mut postorder = Vec::new();

    for root in roots.iter().rev() {
        visit(root, &mut visited, &mut postorder);
    }
    postorder.reverse();

    let index = postorder
        .iter()
        .enumerate()
        .map(|(i, cell)| (cell.hash(), i))
        .collect();
    (postorder, index)
}

fn visit(cell: &Arc<Cell>, visited: &mut HashSet<[u8; 32]>, postorder: &mut Vec<Arc<Cell>>) {
    if !visited.insert(cell.hash()) {
        return;
    }
    for reference in cell.references().iter().rev() {
        visit(reference, visited, postorder);
    }
    postorder.push(cell.clone());
}

fn bytes_needed(value: usize) -> usize {
    if value == 0 {
        return 1;
    }

    let bits = (usize::BITS - value.leading_zeros()) as usize;
    bits.div_ceil(8)
}

fn write_uint(buf: &mut Vec<u8>, value: usize, size: usize) {
    let bytes = (value as u64).to_be_bytes();
    buf.extend_from_slice(&bytes[8 - size..]);
}

fn take<'a>(data: &'a [u8], pos: &mut usize, len: usize) -> Result<&'a [u8]> {
    let end = pos
        .checked_add(len)
        .filter(|&end| end <= data.len())
        .context("Unexpected end of BoC data")?;
    let bytes = &data[*pos..end];
    *pos = end;
    Ok(bytes)
}

fn read_byte(data: &[u8], pos: &mut usize) -> Result<u8> {
    Ok(take(data, pos, 1)?[0])
}

fn read_uint(data: &[u8], pos: &mut usize, size: usize) -> Result<usize> {
    let bytes = take(data, pos, size)?;
    Ok(BigEndian::read_uint(bytes, size) as usize)
}

/// Serializes a cell into a hex-encoded BoC
pub fn boc_to_hex(cell: &Arc<Cell>, has_crc32: bool) -> Result<String> {
    Ok(hex::encode(serialize_boc(cell, has_crc32)?))
}

/// Parses a hex-encoded BoC
pub fn hex_to_boc(s: &str) -> Result<Arc<Cell>> {
    let bytes = hex::decode(s.trim()).context("Invalid hex BoC")?;
    deserialize_boc(&bytes)
}

/// Serializes a cell into a base64-encoded BoC
pub fn boc_to_base64(cell: &Arc<Cell>, has_crc32: bool) -> Result<String> {
    Ok(BASE64.encode(serialize_boc(cell, has_crc32)?))
}

/// Parses a base64-encoded BoC
pub fn base64_to_boc(s: &str) -> Result<Arc<Cell>> {
    let bytes = BASE64.decode(s.trim()).context("Invalid base64 BoC")?;
    deserialize_boc(&bytes)
}
