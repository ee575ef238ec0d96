use crate::core::io::traits::FrameSource;
use crate::core::models::configuration::Configuration;
use nalgebra::{Matrix3, Point3};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Lines, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XyzError {
    #[error("Failed to open trajectory '{path}': {source}")]
    Open { path: String, source: io::Error },

    #[error("I/O error at line {line}: {source}")]
    Io { line: usize, source: io::Error },

    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: XyzParseErrorKind },

    #[error("Unexpected end of file inside frame starting at line {line}")]
    TruncatedFrame { line: usize },

    #[error("Inconsistent data: {0}")]
    Inconsistency(String),

    #[error("I/O error while writing: {0}")]
    Write(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum XyzParseErrorKind {
    #[error("Expected atom count, found '{value}'")]
    InvalidAtomCount { value: String },

    #[error("Atom record needs a symbol and three coordinates")]
    MissingFields,

    #[error("Invalid float format (value: '{value}')")]
    InvalidFloat { value: String },

    #[error("Lattice specification must quote nine floats")]
    InvalidLattice,
}

/// Lazy frame decoder for (extended) XYZ trajectories.
///
/// Implements [`Iterator`], yielding one [`Configuration`] per frame without
/// ever holding more than a single frame in memory. Frames are assigned
/// consecutive stream indices starting at zero. A `Lattice="..."` key in the
/// comment line is decoded into a periodic cell; additional per-atom columns
/// beyond the coordinates are ignored.
pub struct XyzFrames<R: BufRead> {
    lines: Lines<R>,
    line_no: usize,
    next_index: usize,
}

impl XyzFrames<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, XyzError> {
        let file = File::open(&path).map_err(|source| XyzError::Open {
            path: path.as_ref().display().to_string(),
            source,
        })?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> XyzFrames<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            next_index: 0,
        }
    }

    fn read_line(&mut self) -> Option<Result<String, XyzError>> {
        self.line_no += 1;
        match self.lines.next() {
            None => None,
            Some(Ok(line)) => Some(Ok(line)),
            Some(Err(source)) => Some(Err(XyzError::Io {
                line: self.line_no,
                source,
            })),
        }
    }

    fn parse_frame(&mut self, header: String) -> Result<Configuration, XyzError> {
        let header_line = self.line_no;
        let atom_count: usize = header.trim().parse().map_err(|_| XyzError::Parse {
            line: header_line,
            kind: XyzParseErrorKind::InvalidAtomCount {
                value: header.trim().to_string(),
            },
        })?;

        let comment = match self.read_line() {
            Some(Ok(line)) => line,
            Some(Err(e)) => return Err(e),
            None => return Err(XyzError::TruncatedFrame { line: header_line }),
        };
        let cell = parse_lattice(&comment, self.line_no)?;

        let mut species = Vec::with_capacity(atom_count);
        let mut positions = Vec::with_capacity(atom_count);
        for _ in 0..atom_count {
            let line = match self.read_line() {
                Some(Ok(line)) => line,
                Some(Err(e)) => return Err(e),
                None => return Err(XyzError::TruncatedFrame { line: header_line }),
            };
            let line_no = self.line_no;
            let mut fields = line.split_whitespace();
            let symbol = fields.next().ok_or(XyzError::Parse {
                line: line_no,
                kind: XyzParseErrorKind::MissingFields,
            })?;
            let mut coords = [0.0_f64; 3];
            for coord in &mut coords {
                let field = fields.next().ok_or(XyzError::Parse {
                    line: line_no,
                    kind: XyzParseErrorKind::MissingFields,
                })?;
                *coord = field.parse().map_err(|_| XyzError::Parse {
                    line: line_no,
                    kind: XyzParseErrorKind::InvalidFloat {
                        value: field.to_string(),
                    },
                })?;
            }
            species.push(symbol.to_string());
            positions.push(Point3::new(coords[0], coords[1], coords[2]));
        }

        let index = self.next_index;
        self.next_index += 1;
        Configuration::new(index, species, positions, cell)
            .map_err(|e| XyzError::Inconsistency(e.to_string()))
    }
}

impl<R: BufRead> Iterator for XyzFrames<R> {
    type Item = Result<Configuration, XyzError>;

    fn next(&mut self) -> Option<Self::Item> {
        let header = loop {
            match self.read_line()? {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => break line,
                Err(e) => return Some(Err(e)),
            }
        };
        Some(self.parse_frame(header))
    }
}

impl<R: BufRead> FrameSource for XyzFrames<R> {
    type Error = XyzError;

    fn next_frame(&mut self) -> Option<Result<Configuration, Self::Error>> {
        self.next()
    }
}

fn parse_lattice(comment: &str, line: usize) -> Result<Option<Matrix3<f64>>, XyzError> {
    let Some(start) = comment.find("Lattice=\"") else {
        return Ok(None);
    };
    let rest = &comment[start + "Lattice=\"".len()..];
    let Some(end) = rest.find('"') else {
        return Err(XyzError::Parse {
            line,
            kind: XyzParseErrorKind::InvalidLattice,
        });
    };
    let values: Vec<f64> = rest[..end]
        .split_whitespace()
        .map(str::parse)
        .collect::<Result<_, _>>()
        .map_err(|_| XyzError::Parse {
            line,
            kind: XyzParseErrorKind::InvalidLattice,
        })?;
    if values.len() != 9 {
        return Err(XyzError::Parse {
            line,
            kind: XyzParseErrorKind::InvalidLattice,
        });
    }
    Ok(Some(Matrix3::new(
        values[0], values[1], values[2], values[3], values[4], values[5], values[6], values[7],
        values[8],
    )))
}

/// Writes one frame in extended-XYZ form.
///
/// The comment line carries the frame's provenance: its original stream index
/// (`frame_index=`), the disagreement score when given (`eps_t=`), and the
/// periodic cell if the configuration has one.
pub fn write_frame(
    configuration: &Configuration,
    eps_t: Option<f64>,
    writer: &mut impl Write,
) -> Result<(), XyzError> {
    writeln!(writer, "{}", configuration.atom_count())?;

    let mut comment = String::new();
    if let Some(cell) = configuration.cell() {
        comment.push_str("Lattice=\"");
        for row in 0..3 {
            for col in 0..3 {
                if row + col > 0 {
                    comment.push(' ');
                }
                comment.push_str(&format!("{:.8}", cell[(row, col)]));
            }
        }
        comment.push_str("\" ");
    }
    comment.push_str("Properties=species:S:1:pos:R:3");
    comment.push_str(&format!(" frame_index={}", configuration.index()));
    if let Some(eps) = eps_t {
        comment.push_str(&format!(" eps_t={:.6}", eps));
    }
    writeln!(writer, "{}", comment)?;

    for (symbol, position) in configuration
        .species()
        .iter()
        .zip(configuration.positions())
    {
        writeln!(
            writer,
            "{} {:.8} {:.8} {:.8}",
            symbol, position.x, position.y, position.z
        )?;
    }
    Ok(())
}

/// Writes a sequence of frames with optional per-frame scores.
pub fn write_frames<'a, I>(frames: I, writer: &mut impl Write) -> Result<(), XyzError>
where
    I: IntoIterator<Item = (&'a Configuration, Option<f64>)>,
{
    for (configuration, eps_t) in frames {
        write_frame(configuration, eps_t, writer)?;
    }
    Ok(())
}

/// Writes a sequence of frames to a file path.
pub fn write_frames_to_path<'a, I, P>(frames: I, path: P) -> Result<(), XyzError>
where
    I: IntoIterator<Item = (&'a Configuration, Option<f64>)>,
    P: AsRef<Path>,
{
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_frames(frames, &mut writer)
}
