//! Minimal NPY (format 1.0-3.0) codec for `<f8` matrices and vectors.
//!
//! Matrices are written in Fortran (column-major) order so that a single
//! column is one contiguous byte range and can be read with one seek.
//! Both orders are accepted on read.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use lb_core::Real;
use nalgebra::DMatrix;

use crate::error::{MatrixError, MatrixResult};
use crate::matrix::Matrix;

const MAGIC: &[u8; 6] = b"\x93NUMPY";
const ALIGN: usize = 64;

/// Parsed NPY header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpyHeader {
    pub shape: Vec<usize>,
    pub fortran_order: bool,
    /// Byte offset of the first element.
    pub data_offset: u64,
}

impl NpyHeader {
    pub fn rows(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    /// Vectors (1-d arrays) are treated as a single column.
    pub fn cols(&self) -> usize {
        match self.shape.len() {
            0 | 1 => 1,
            _ => self.shape[1],
        }
    }

    fn offset_of(&self, row: usize, col: usize) -> u64 {
        let linear = if self.fortran_order || self.shape.len() < 2 {
            col * self.rows() + row
        } else {
            row * self.cols() + col
        };
        self.data_offset + (linear * 8) as u64
    }
}

/// Write a matrix as a 2-d column-major array.
pub fn write_matrix(path: &Path, matrix: &Matrix) -> MatrixResult<()> {
    let dense = matrix.to_dense();
    let shape = format!("({}, {})", dense.nrows(), dense.ncols());
    write_array(path, &shape, dense.as_slice())
}

/// Write a vector as a 1-d array.
pub fn write_vector(path: &Path, values: &[Real]) -> MatrixResult<()> {
    let shape = format!("({},)", values.len());
    write_array(path, &shape, values)
}

fn write_array(path: &Path, shape: &str, data: &[Real]) -> MatrixResult<()> {
    let mut header =
        format!("{{'descr': '<f8', 'fortran_order': True, 'shape': {shape}, }}");
    // magic(6) + version(2) + header length(2) + header + '\n' is 64-byte aligned
    let unpadded = MAGIC.len() + 4 + header.len() + 1;
    header.push_str(&" ".repeat((ALIGN - unpadded % ALIGN) % ALIGN));
    header.push('\n');

    let file = File::create(path).map_err(|e| MatrixError::io(path, e))?;
    let mut out = BufWriter::new(file);
    let header_len = u16::try_from(header.len())
        .map_err(|_| MatrixError::format(path, "header too long"))?;

    let write = |out: &mut BufWriter<File>| -> std::io::Result<()> {
        out.write_all(MAGIC)?;
        out.write_all(&[1, 0])?;
        out.write_all(&header_len.to_le_bytes())?;
        out.write_all(header.as_bytes())?;
        for v in data {
            out.write_all(&v.to_le_bytes())?;
        }
        out.flush()
    };
    write(&mut out).map_err(|e| MatrixError::io(path, e))
}

fn open(path: &Path) -> MatrixResult<(BufReader<File>, NpyHeader)> {
    let file = File::open(path).map_err(|e| MatrixError::io(path, e))?;
    let mut reader = BufReader::new(file);
    let header = read_header(&mut reader, path)?;
    Ok((reader, header))
}

fn read_header(reader: &mut impl Read, path: &Path) -> MatrixResult<NpyHeader> {
    let mut preamble = [0u8; 8];
    reader
        .read_exact(&mut preamble)
        .map_err(|e| MatrixError::io(path, e))?;
    if &preamble[..6] != MAGIC {
        return Err(MatrixError::format(path, "missing NPY magic"));
    }

    let major = preamble[6];
    let (len_bytes, header_len) = match major {
        1 => {
            let mut buf = [0u8; 2];
            reader.read_exact(&mut buf).map_err(|e| MatrixError::io(path, e))?;
            (2, u16::from_le_bytes(buf) as usize)
        }
        2 | 3 => {
            let mut buf = [0u8; 4];
            reader.read_exact(&mut buf).map_err(|e| MatrixError::io(path, e))?;
            (4, u32::from_le_bytes(buf) as usize)
        }
        v => return Err(MatrixError::format(path, format!("unsupported version {v}"))),
    };

    let mut raw = vec![0u8; header_len];
    reader.read_exact(&mut raw).map_err(|e| MatrixError::io(path, e))?;
    let dict = String::from_utf8_lossy(&raw);

    let descr = dict_value(&dict, "descr")
        .map(|v| v.trim_matches(|c| c == '\'' || c == '"').to_string())
        .ok_or_else(|| MatrixError::format(path, "no descr"))?;
    if descr != "<f8" && descr != "<d" {
        return Err(MatrixError::format(path, format!("unsupported dtype {descr}")));
    }

    let fortran_order = dict_value(&dict, "fortran_order")
        .map(|v| v.starts_with("True"))
        .unwrap_or(false);

    let shape_start = dict
        .find("'shape'")
        .and_then(|i| dict[i..].find('(').map(|j| i + j + 1))
        .ok_or_else(|| MatrixError::format(path, "no shape"))?;
    let shape_end = dict[shape_start..]
        .find(')')
        .map(|j| shape_start + j)
        .ok_or_else(|| MatrixError::format(path, "unterminated shape"))?;
    let shape = dict[shape_start..shape_end]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| MatrixError::format(path, format!("bad shape: {e}")))?;
    if shape.len() > 2 {
        return Err(MatrixError::format(path, "more than two dimensions"));
    }

    Ok(NpyHeader {
        shape,
        fortran_order,
        data_offset: (MAGIC.len() + 2 + len_bytes + header_len) as u64,
    })
}

/// Value text following `'key':` in a header dict, up to the next comma.
fn dict_value<'a>(dict: &'a str, key: &str) -> Option<&'a str> {
    let pattern = format!("'{key}':");
    let start = dict.find(&pattern)? + pattern.len();
    let rest = dict[start..].trim_start();
    let end = rest.find(',').unwrap_or(rest.len());
    Some(rest[..end].trim())
}

fn read_f64s(reader: &mut impl Read, count: usize, path: &Path) -> MatrixResult<Vec<Real>> {
    let mut bytes = vec![0u8; count * 8];
    reader
        .read_exact(&mut bytes)
        .map_err(|e| MatrixError::io(path, e))?;
    Ok(bytes
        .chunks_exact(8)
        .map(|c| {
            let mut b = [0u8; 8];
            b.copy_from_slice(c);
            Real::from_le_bytes(b)
        })
        .collect())
}

/// Read only the header of a file.
pub fn read_shape(path: &Path) -> MatrixResult<(usize, usize)> {
    let (_, header) = open(path)?;
    Ok((header.rows(), header.cols()))
}

/// Read a full matrix into dense storage.
pub fn read_matrix(path: &Path) -> MatrixResult<Matrix> {
    let (mut reader, header) = open(path)?;
    let (rows, cols) = (header.rows(), header.cols());
    let data = read_f64s(&mut reader, rows * cols, path)?;
    let m = if header.fortran_order || header.shape.len() < 2 {
        DMatrix::from_column_slice(rows, cols, &data)
    } else {
        DMatrix::from_row_slice(rows, cols, &data)
    };
    Ok(Matrix::Dense(m))
}

/// Read a 1-d array (or the single column of a 2-d one).
pub fn read_vector(path: &Path) -> MatrixResult<Vec<Real>> {
    read_column(path, 0)
}

/// Read one column without loading the rest of the payload.
pub fn read_column(path: &Path, col: usize) -> MatrixResult<Vec<Real>> {
    let (mut reader, header) = open(path)?;
    let (rows, cols) = (header.rows(), header.cols());
    if col >= cols {
        return Err(MatrixError::ColumnOob {
            path: path.to_path_buf(),
            column: col,
            columns: cols,
        });
    }
    if header.fortran_order || header.shape.len() < 2 {
        reader
            .seek(SeekFrom::Start(header.offset_of(0, col)))
            .map_err(|e| MatrixError::io(path, e))?;
        return read_f64s(&mut reader, rows, path);
    }
    let mut column = Vec::with_capacity(rows);
    for row in 0..rows {
        column.push(read_at(&mut reader, header.offset_of(row, col), path)?);
    }
    Ok(column)
}

/// Read the main diagonal.
pub fn read_diagonal(path: &Path) -> MatrixResult<Vec<Real>> {
    let (mut reader, header) = open(path)?;
    let n = header.rows().min(header.cols());
    (0..n)
        .map(|i| read_at(&mut reader, header.offset_of(i, i), path))
        .collect()
}

fn read_at<R: Read + Seek>(reader: &mut R, offset: u64, path: &Path) -> MatrixResult<Real> {
    reader
        .seek(SeekFrom::Start(offset))
        .map_err(|e| MatrixError::io(path, e))?;
    let mut b = [0u8; 8];
    reader
        .read_exact(&mut b)
        .map_err(|e| MatrixError::io(path, e))?;
    Ok(Real::from_le_bytes(b))
}
