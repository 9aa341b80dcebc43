//! VTK writer for ParaView visualization of spline control nets.
//!
//! Each converged time step is written as one legacy ASCII `.vtk` file holding
//! the control points and per-control-point fields (homogeneous displacement
//! components, homogeneous reference coordinates, weights). A ParaView `.pvd`
//! collection ties the snapshots into a time series.
//!
//! Control nets with a tensor-product layout are written as
//! `STRUCTURED_GRID`; unstructured nets (e.g. T-spline control meshes) fall
//! back to `POLYDATA` vertices.
//!
//! ```rust,no_run
//! use kls_io::{ControlNet, PointData, TimeSeriesWriter};
//!
//! let net = ControlNet::structured([2, 2], vec![[0.0; 3]; 4]);
//! let data = vec![PointData::scalars("F3", vec![1.0; 4])];
//! let mut series = TimeSeriesWriter::new("results", "shell");
//! series.write_step(0.001, &net, &data)?;
//! series.finish()?;
//! # Ok::<(), kls_io::IoError>(())
//! ```

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{IoError, Result};
use crate::json::ensure_parent_dir;

/// Control-point positions, optionally with a tensor-product layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlNet {
    /// Number of control points along each parametric direction
    pub dims: Option<[usize; 2]>,
    /// Control-point coordinates, first parametric index fastest
    pub points: Vec<[f64; 3]>,
}

impl ControlNet {
    pub fn structured(dims: [usize; 2], points: Vec<[f64; 3]>) -> Self {
        Self {
            dims: Some(dims),
            points,
        }
    }

    pub fn unstructured(points: Vec<[f64; 3]>) -> Self {
        Self { dims: None, points }
    }

    fn validate(&self) -> Result<()> {
        if let Some([nu, nv]) = self.dims
            && nu * nv != self.points.len()
        {
            return Err(IoError::InvalidData(format!(
                "control net dims {}x{} do not match {} points",
                nu,
                nv,
                self.points.len()
            )));
        }
        Ok(())
    }
}

/// A named field sampled at control points.
#[derive(Debug, Clone, PartialEq)]
pub enum PointData {
    Scalars { name: String, values: Vec<f64> },
    Vectors { name: String, values: Vec<[f64; 3]> },
}

impl PointData {
    pub fn scalars(name: impl Into<String>, values: Vec<f64>) -> Self {
        PointData::Scalars {
            name: name.into(),
            values,
        }
    }

    pub fn vectors(name: impl Into<String>, values: Vec<[f64; 3]>) -> Self {
        PointData::Vectors {
            name: name.into(),
            values,
        }
    }

    fn name(&self) -> &str {
        match self {
            PointData::Scalars { name, .. } | PointData::Vectors { name, .. } => name,
        }
    }

    fn len(&self) -> usize {
        match self {
            PointData::Scalars { values, .. } => values.len(),
            PointData::Vectors { values, .. } => values.len(),
        }
    }
}

/// Legacy VTK writer for one control-net snapshot
pub struct VtkWriter<'a> {
    net: &'a ControlNet,
    data: &'a [PointData],
}

impl<'a> VtkWriter<'a> {
    /// Create a writer, checking that every field has one value per point
    pub fn new(net: &'a ControlNet, data: &'a [PointData]) -> Result<Self> {
        net.validate()?;
        for field in data {
            if field.len() != net.points.len() {
                return Err(IoError::InvalidData(format!(
                    "field '{}' has {} values for {} points",
                    field.name(),
                    field.len(),
                    net.points.len()
                )));
            }
        }
        Ok(Self { net, data })
    }

    /// Write VTK legacy format file
    pub fn write_vtk<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        ensure_parent_dir(path)?;
        let mut file = BufWriter::new(File::create(path)?);
        self.write_header(&mut file)?;
        self.write_geometry(&mut file)?;
        self.write_point_data(&mut file)?;
        file.flush()?;
        Ok(())
    }

    fn write_header(&self, out: &mut impl Write) -> Result<()> {
        writeln!(out, "# vtk DataFile Version 3.0")?;
        writeln!(out, "Kirchhoff-Love shell control net")?;
        writeln!(out, "ASCII")?;
        Ok(())
    }

    fn write_geometry(&self, out: &mut impl Write) -> Result<()> {
        let n = self.net.points.len();
        match self.net.dims {
            Some([nu, nv]) => {
                writeln!(out, "DATASET STRUCTURED_GRID")?;
                writeln!(out, "DIMENSIONS {} {} 1", nu, nv)?;
                self.write_points(out)?;
            }
            None => {
                writeln!(out, "DATASET POLYDATA")?;
                self.write_points(out)?;
                writeln!(out, "VERTICES {} {}", n, 2 * n)?;
                for i in 0..n {
                    writeln!(out, "1 {}", i)?;
                }
            }
        }
        Ok(())
    }

    fn write_points(&self, out: &mut impl Write) -> Result<()> {
        writeln!(out, "POINTS {} double", self.net.points.len())?;
        for p in &self.net.points {
            writeln!(out, "{:e} {:e} {:e}", p[0], p[1], p[2])?;
        }
        Ok(())
    }

    fn write_point_data(&self, out: &mut impl Write) -> Result<()> {
        if self.data.is_empty() {
            return Ok(());
        }
        writeln!(out, "POINT_DATA {}", self.net.points.len())?;
        for field in self.data {
            match field {
                PointData::Scalars { name, values } => {
                    writeln!(out, "SCALARS {} double 1", name)?;
                    writeln!(out, "LOOKUP_TABLE default")?;
                    for v in values {
                        writeln!(out, "{:e}", v)?;
                    }
                }
                PointData::Vectors { name, values } => {
                    writeln!(out, "VECTORS {} double", name)?;
                    for v in values {
                        writeln!(out, "{:e} {:e} {:e}", v[0], v[1], v[2])?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Accumulates per-step snapshots and the `.pvd` collection indexing them.
#[derive(Debug)]
pub struct TimeSeriesWriter {
    dir: PathBuf,
    prefix: String,
    entries: Vec<(f64, String)>,
}

impl TimeSeriesWriter {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            entries: Vec::new(),
        }
    }

    /// Number of snapshots written so far
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write one snapshot and register it in the collection
    pub fn write_step(
        &mut self,
        time: f64,
        net: &ControlNet,
        data: &[PointData],
    ) -> Result<PathBuf> {
        let file_name = format!("{}_{:06}.vtk", self.prefix, self.entries.len());
        let path = self.dir.join(&file_name);
        VtkWriter::new(net, data)?.write_vtk(&path)?;
        self.entries.push((time, file_name));
        tracing::trace!(path = %path.display(), time, "snapshot written");
        Ok(path)
    }

    /// Write the `.pvd` collection file and return its path
    pub fn finish(&self) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{}.pvd", self.prefix));
        let mut out = BufWriter::new(File::create(&path)?);
        writeln!(out, "<?xml version=\"1.0\"?>")?;
        writeln!(
            out,
            "<VTKFile type=\"Collection\" version=\"0.1\" byte_order=\"LittleEndian\">"
        )?;
        writeln!(out, "  <Collection>")?;
        for (time, file) in &self.entries {
            writeln!(
                out,
                "    <DataSet timestep=\"{:e}\" group=\"\" part=\"0\" file=\"{}\"/>",
                time, file
            )?;
        }
        writeln!(out, "  </Collection>")?;
        writeln!(out, "</VTKFile>")?;
        out.flush()?;
        Ok(path)
    }
}
