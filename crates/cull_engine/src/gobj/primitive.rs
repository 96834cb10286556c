//! Vertex-index collections
//!
//! A [`GeomPrimitive`] lists which rows of a [`VertexData`] make up a set of
//! primitives of one [`PrimitiveTopology`]. It starts out non-indexed (a
//! first vertex plus a count) and is promoted to an [`IndexArray`] the first
//! time a vertex breaks the consecutive run. Promotion is one-way.
//!
//! All state lives in a [`PipelineCycler`]: mutators take `&self` and write
//! the upstream stage, readers take an `Arc<PrimitiveData>` snapshot that no
//! later write can disturb.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use super::{
    GeomError, GeomRendering, GeomResult, IndexArray, IndexBufferContext, NumericType, PreparedObjects,
    PrimitiveTopology, ShadeModel, UsageHint, VertexData, VERTEX,
};
use crate::foundation::collections::IdAllocator;
use crate::foundation::cycler::PipelineCycler;
use crate::foundation::math::{utils, Mat4, Mat4Ext, Point3};

static PRIMITIVE_IDS: IdAllocator = IdAllocator::new();

/// Construction parameters for a primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimitiveSettings {
    /// How often the indices are expected to change
    pub usage_hint: UsageHint,
    /// Storage width used when the primitive becomes indexed
    pub index_type: NumericType,
    /// Provoking-vertex convention
    pub shade_model: ShadeModel,
    /// Number of pipeline stages
    pub num_stages: usize,
}

impl Default for PrimitiveSettings {
    fn default() -> Self {
        Self {
            usage_hint: UsageHint::Static,
            index_type: NumericType::U16,
            shade_model: ShadeModel::Smooth,
            num_stages: 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct MinMax {
    min_vertex: u32,
    max_vertex: u32,
    mins: Vec<u32>,
    maxs: Vec<u32>,
}

/// One pipeline stage's view of a primitive
#[derive(Debug, Clone)]
pub struct PrimitiveData {
    topology: PrimitiveTopology,
    shade_model: ShadeModel,
    usage_hint: UsageHint,
    index_type: NumericType,
    first_vertex: u32,
    num_vertices: usize,
    vertices: Option<Arc<IndexArray>>,
    ends: Arc<Vec<usize>>,
    modified: u64,
    minmax: OnceLock<MinMax>,
}

impl PrimitiveData {
    fn new(topology: PrimitiveTopology, settings: &PrimitiveSettings) -> Self {
        Self {
            topology,
            shade_model: settings.shade_model,
            usage_hint: settings.usage_hint,
            index_type: settings.index_type,
            first_vertex: 0,
            num_vertices: 0,
            vertices: None,
            ends: Arc::new(Vec::new()),
            modified: 0,
            minmax: OnceLock::new(),
        }
    }

    /// Primitive kind
    pub const fn topology(&self) -> PrimitiveTopology {
        self.topology
    }

    /// Provoking-vertex convention
    pub const fn shade_model(&self) -> ShadeModel {
        self.shade_model
    }

    /// Usage hint for the index buffer
    pub const fn usage_hint(&self) -> UsageHint {
        self.usage_hint
    }

    /// Width of stored indices
    pub const fn index_type(&self) -> NumericType {
        self.index_type
    }

    /// Modification counter, bumped by every write
    pub const fn modified(&self) -> u64 {
        self.modified
    }

    /// Whether an index array is in use
    pub const fn is_indexed(&self) -> bool {
        self.vertices.is_some()
    }

    /// The index array, if indexed
    pub fn vertices(&self) -> Option<&Arc<IndexArray>> {
        self.vertices.as_ref()
    }

    /// Primitive boundaries for variable-size topologies
    pub fn ends(&self) -> &[usize] {
        &self.ends
    }

    /// First vertex referenced (0 when empty)
    pub fn first_vertex(&self) -> u32 {
        match &self.vertices {
            Some(vertices) => vertices.get(0).unwrap_or(0),
            None => self.first_vertex,
        }
    }

    /// Number of vertex slots, connector vertices included
    pub fn num_vertices(&self) -> usize {
        match &self.vertices {
            Some(vertices) => vertices.len(),
            None => self.num_vertices,
        }
    }

    /// Vertex stored in slot `i`
    pub fn get_vertex(&self, i: usize) -> GeomResult<u32> {
        let count = self.num_vertices();
        if i >= count {
            return Err(GeomError::VertexOutOfRange { index: i, count });
        }
        Ok(self.vertex_unchecked(i))
    }

    /// Iterate over every vertex slot in order
    pub fn vertex_iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.num_vertices()).map(move |i| self.vertex_unchecked(i))
    }

    /// Number of closed primitives
    pub fn num_primitives(&self) -> usize {
        let per = self.topology.num_vertices_per_primitive();
        if per == 0 {
            self.ends.len()
        } else {
            let unused = self.topology.num_unused_vertices_per_primitive();
            (self.num_vertices() + unused) / (per + unused)
        }
    }

    /// Slot at which primitive `n` starts
    ///
    /// `n == num_primitives()` is allowed and yields the slot where the next
    /// primitive would begin.
    pub fn primitive_start(&self, n: usize) -> GeomResult<usize> {
        let count = self.num_primitives();
        if n > count {
            return Err(GeomError::PrimitiveOutOfRange { index: n, count });
        }
        let per = self.topology.num_vertices_per_primitive();
        let unused = self.topology.num_unused_vertices_per_primitive();
        if per == 0 {
            Ok(if n == 0 { 0 } else { self.ends[n - 1] + unused })
        } else {
            Ok(n * (per + unused))
        }
    }

    /// One past the last slot of primitive `n`
    pub fn primitive_end(&self, n: usize) -> GeomResult<usize> {
        let count = self.num_primitives();
        if n >= count {
            return Err(GeomError::PrimitiveOutOfRange { index: n, count });
        }
        let per = self.topology.num_vertices_per_primitive();
        if per == 0 {
            Ok(self.ends[n])
        } else {
            let unused = self.topology.num_unused_vertices_per_primitive();
            Ok(n * (per + unused) + per)
        }
    }

    /// Number of vertices in primitive `n`
    pub fn primitive_num_vertices(&self, n: usize) -> GeomResult<usize> {
        let end = self.primitive_end(n)?;
        let start = self.primitive_start(n)?;
        Ok(end.saturating_sub(start))
    }

    /// The vertices of primitive `n`, connectors excluded
    pub fn primitive_vertices(&self, n: usize) -> GeomResult<Vec<u32>> {
        let start = self.primitive_start(n)?;
        let end = self.primitive_end(n)?;
        (start..end).map(|i| self.get_vertex(i)).collect()
    }

    /// Smallest vertex referenced by primitive `n`
    pub fn primitive_min_vertex(&self, n: usize) -> GeomResult<u32> {
        if self.is_indexed() {
            let count = self.num_primitives();
            self.minmax()
                .mins
                .get(n)
                .copied()
                .ok_or(GeomError::PrimitiveOutOfRange { index: n, count })
        } else {
            Ok(self.first_vertex + self.primitive_start(n)? as u32)
        }
    }

    /// Largest vertex referenced by primitive `n`
    pub fn primitive_max_vertex(&self, n: usize) -> GeomResult<u32> {
        if self.is_indexed() {
            let count = self.num_primitives();
            self.minmax()
                .maxs
                .get(n)
                .copied()
                .ok_or(GeomError::PrimitiveOutOfRange { index: n, count })
        } else {
            let end = self.primitive_end(n)?;
            Ok(self.first_vertex + end.saturating_sub(1) as u32)
        }
    }

    /// Smallest vertex referenced overall (0 when empty)
    pub fn min_vertex(&self) -> u32 {
        if self.is_indexed() {
            self.minmax().min_vertex
        } else {
            self.first_vertex
        }
    }

    /// Largest vertex referenced overall (0 when empty)
    pub fn max_vertex(&self) -> u32 {
        if self.is_indexed() {
            self.minmax().max_vertex
        } else if self.num_vertices == 0 {
            self.first_vertex
        } else {
            self.first_vertex + (self.num_vertices - 1) as u32
        }
    }

    /// Bytes consumed by this record and its tables
    pub fn num_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.ends.len() * std::mem::size_of::<usize>()
            + self.vertices.as_ref().map_or(0, |v| v.data_size_bytes())
    }

    /// Backend capabilities required to draw this stage
    pub fn geom_rendering(&self) -> GeomRendering {
        self.topology.geom_rendering(self.is_indexed(), self.shade_model)
    }

    fn vertex_unchecked(&self, i: usize) -> u32 {
        match &self.vertices {
            Some(vertices) => vertices.get(i).unwrap_or(0),
            None => self.first_vertex + i as u32,
        }
    }

    fn minmax(&self) -> &MinMax {
        self.minmax.get_or_init(|| self.compute_minmax())
    }

    fn compute_minmax(&self) -> MinMax {
        let mut minmax = MinMax::default();
        let mut all = self.vertex_iter();
        if let Some(first) = all.next() {
            let (lo, hi) = all.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
            minmax.min_vertex = lo;
            minmax.max_vertex = hi;
        }
        for n in 0..self.num_primitives() {
            let (Ok(start), Ok(end)) = (self.primitive_start(n), self.primitive_end(n)) else {
                break;
            };
            let mut range = (start..end.min(self.num_vertices())).map(|i| self.vertex_unchecked(i));
            let (lo, hi) = match range.next() {
                Some(first) => range.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))),
                None => (0, 0),
            };
            minmax.mins.push(lo);
            minmax.maxs.push(hi);
        }
        minmax
    }

    fn touch(&mut self) {
        self.modified += 1;
        self.minmax = OnceLock::new();
    }

    fn indices_mut(&mut self) -> &mut IndexArray {
        let (first, count, index_type) = (self.first_vertex, self.num_vertices, self.index_type);
        let vertices = self
            .vertices
            .get_or_insert_with(|| Arc::new(consecutive_indices(index_type, first, count)));
        Arc::make_mut(vertices)
    }

    fn push_index(&mut self, vertex: u32) {
        let indices = self.indices_mut();
        let widened = indices.push_widening(vertex);
        let index_type = indices.index_type();
        if widened {
            log::debug!(
                "{} primitive widened its indices from {:?} to {:?} for vertex {}",
                self.topology,
                self.index_type,
                index_type,
                vertex
            );
        }
        self.index_type = index_type;
    }

    /// Insert connector vertices if `first` is about to start a new primitive
    fn begin_primitive(&mut self, first: u32) {
        if !self.topology.requires_unused_vertices() {
            return;
        }
        let num_primitives = self.num_primitives();
        if num_primitives == 0 {
            return;
        }
        let Ok(end) = self.primitive_end(num_primitives - 1) else {
            return;
        };
        if end == 0 || self.num_vertices() != end {
            return;
        }
        let last = self.vertex_unchecked(end - 1);
        self.push_index(last);
        self.push_index(first);
    }

    fn append_run(&mut self, start: u32, count: usize) {
        if count == 0 {
            return;
        }
        self.begin_primitive(start);
        if self.vertices.is_none() {
            if self.num_vertices == 0 {
                self.first_vertex = start;
                self.num_vertices = count;
                return;
            }
            if u64::from(start) == u64::from(self.first_vertex) + self.num_vertices as u64 {
                self.num_vertices += count;
                return;
            }
        }
        for offset in 0..count as u32 {
            self.push_index(start + offset);
        }
    }

    fn close_primitive(&mut self) -> GeomResult<()> {
        let topology = self.topology;
        let num_vertices = self.num_vertices();
        let per = topology.num_vertices_per_primitive();
        let unused = topology.num_unused_vertices_per_primitive();
        if per == 0 {
            let added = match self.ends.last() {
                Some(&last) => num_vertices.saturating_sub(last + unused),
                None => num_vertices,
            };
            let required = topology.min_num_vertices_per_primitive();
            if added < required {
                return Err(GeomError::TooFewVertices {
                    topology,
                    required,
                    added,
                });
            }
            Arc::make_mut(&mut self.ends).push(num_vertices);
        } else if (num_vertices + unused) % (per + unused) != 0 {
            return Err(GeomError::IncompletePrimitive {
                topology,
                num_vertices,
                per_primitive: per + unused,
            });
        }
        self.touch();
        Ok(())
    }
}

fn consecutive_indices(index_type: NumericType, first: u32, count: usize) -> IndexArray {
    index_array_from(index_type, (0..count as u32).map(|i| first + i))
}

/// Pipelined vertex-index collection of one topology
#[derive(Debug)]
pub struct GeomPrimitive {
    id: u64,
    topology: PrimitiveTopology,
    cycler: PipelineCycler<PrimitiveData>,
    prepared: Mutex<Vec<Weak<PreparedObjects>>>,
}

impl GeomPrimitive {
    /// Create an empty primitive with default settings
    pub fn new(topology: PrimitiveTopology) -> Self {
        Self::with_settings(topology, PrimitiveSettings::default())
    }

    /// Create an empty primitive
    pub fn with_settings(topology: PrimitiveTopology, mut settings: PrimitiveSettings) -> Self {
        if !settings.index_type.is_index_type() {
            log::warn!(
                "{:?} cannot store indices, {} primitive falls back to U16",
                settings.index_type,
                topology
            );
            settings.index_type = NumericType::U16;
        }
        Self {
            id: PRIMITIVE_IDS.allocate(),
            topology,
            cycler: PipelineCycler::new(PrimitiveData::new(topology, &settings), settings.num_stages),
            prepared: Mutex::new(Vec::new()),
        }
    }

    /// A new primitive sharing this one's current data copy-on-write
    pub fn make_copy(&self) -> Self {
        Self {
            id: PRIMITIVE_IDS.allocate(),
            topology: self.topology,
            cycler: self.cycler.clone(),
            prepared: Mutex::new(Vec::new()),
        }
    }

    /// Unique id of this primitive
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Primitive kind
    pub const fn topology(&self) -> PrimitiveTopology {
        self.topology
    }

    /// Snapshot of the upstream stage
    pub fn data(&self) -> Arc<PrimitiveData> {
        self.cycler.read(0)
    }

    /// Snapshot of a given pipeline stage
    pub fn stage(&self, stage: usize) -> Arc<PrimitiveData> {
        self.cycler.read(stage)
    }

    /// Number of pipeline stages
    pub fn num_stages(&self) -> usize {
        self.cycler.num_stages()
    }

    /// Hand each stage's data one stage downstream
    pub fn cycle(&self) {
        self.cycler.cycle();
    }

    fn write_data<R>(&self, f: impl FnOnce(&mut PrimitiveData) -> R) -> R {
        self.cycler.write(0, f)
    }

    // Queries on the upstream stage

    /// Provoking-vertex convention
    pub fn shade_model(&self) -> ShadeModel {
        self.data().shade_model()
    }

    /// Usage hint for the index buffer
    pub fn usage_hint(&self) -> UsageHint {
        self.data().usage_hint()
    }

    /// Width of stored indices
    pub fn index_type(&self) -> NumericType {
        self.data().index_type()
    }

    /// Modification counter
    pub fn modified(&self) -> u64 {
        self.data().modified()
    }

    /// Whether an index array is in use
    pub fn is_indexed(&self) -> bool {
        self.data().is_indexed()
    }

    /// The index array, if indexed
    pub fn vertices(&self) -> Option<Arc<IndexArray>> {
        self.data().vertices().cloned()
    }

    /// Primitive boundaries for variable-size topologies
    pub fn ends(&self) -> Vec<usize> {
        self.data().ends().to_vec()
    }

    /// First vertex referenced
    pub fn first_vertex(&self) -> u32 {
        self.data().first_vertex()
    }

    /// Number of vertex slots
    pub fn num_vertices(&self) -> usize {
        self.data().num_vertices()
    }

    /// Vertex stored in slot `i`
    pub fn get_vertex(&self, i: usize) -> GeomResult<u32> {
        self.data().get_vertex(i)
    }

    /// Number of closed primitives
    pub fn num_primitives(&self) -> usize {
        self.data().num_primitives()
    }

    /// Slot at which primitive `n` starts
    pub fn primitive_start(&self, n: usize) -> GeomResult<usize> {
        self.data().primitive_start(n)
    }

    /// One past the last slot of primitive `n`
    pub fn primitive_end(&self, n: usize) -> GeomResult<usize> {
        self.data().primitive_end(n)
    }

    /// Number of vertices in primitive `n`
    pub fn primitive_num_vertices(&self, n: usize) -> GeomResult<usize> {
        self.data().primitive_num_vertices(n)
    }

    /// Smallest vertex referenced by primitive `n`
    pub fn primitive_min_vertex(&self, n: usize) -> GeomResult<u32> {
        self.data().primitive_min_vertex(n)
    }

    /// Largest vertex referenced by primitive `n`
    pub fn primitive_max_vertex(&self, n: usize) -> GeomResult<u32> {
        self.data().primitive_max_vertex(n)
    }

    /// Smallest vertex referenced overall
    pub fn min_vertex(&self) -> u32 {
        self.data().min_vertex()
    }

    /// Largest vertex referenced overall
    pub fn max_vertex(&self) -> u32 {
        self.data().max_vertex()
    }

    /// Bytes consumed by the primitive and its tables
    pub fn num_bytes(&self) -> usize {
        std::mem::size_of::<Self>() + self.data().num_bytes()
    }

    /// Backend capabilities required to draw this primitive
    pub fn geom_rendering(&self) -> GeomRendering {
        self.data().geom_rendering()
    }

    // Mutators

    /// Change the provoking-vertex convention
    pub fn set_shade_model(&self, shade_model: ShadeModel) {
        self.write_data(|d| {
            d.shade_model = shade_model;
            d.modified += 1;
        });
    }

    /// Change the usage hint
    pub fn set_usage_hint(&self, usage_hint: UsageHint) {
        self.write_data(|d| {
            d.usage_hint = usage_hint;
            d.modified += 1;
        });
    }

    /// Re-encode the indices at a new width
    ///
    /// Fails without side effects if a stored index does not fit or the
    /// type is not an index type.
    pub fn set_index_type(&self, index_type: NumericType) -> GeomResult<()> {
        let result = self.write_data(|d| {
            if !index_type.is_index_type() {
                return Err(GeomError::NotAnIndexType(index_type));
            }
            if let Some(vertices) = &d.vertices {
                let reencoded = vertices.reencode(index_type)?;
                d.vertices = Some(Arc::new(reencoded));
            }
            d.index_type = index_type;
            d.touch();
            Ok(())
        });
        if let Err(err) = &result {
            log::error!("set_index_type on {} primitive {}: {}", self.topology, self.id, err);
        }
        result
    }

    /// Append one vertex
    ///
    /// Stays non-indexed while vertices arrive consecutively; anything else
    /// promotes the primitive to indexed storage for good.
    pub fn add_vertex(&self, vertex: u32) {
        self.write_data(|d| {
            d.begin_primitive(vertex);
            if d.vertices.is_none() {
                if d.num_vertices == 0 {
                    d.first_vertex = vertex;
                    d.num_vertices = 1;
                    d.touch();
                    return;
                }
                if u64::from(vertex) == u64::from(d.first_vertex) + d.num_vertices as u64 {
                    d.num_vertices += 1;
                    d.touch();
                    return;
                }
            }
            d.push_index(vertex);
            d.touch();
        });
    }

    /// Append several vertices in order
    pub fn add_vertices(&self, vertices: &[u32]) {
        for &vertex in vertices {
            self.add_vertex(vertex);
        }
    }

    /// Append `count` consecutive vertices beginning at `start`
    pub fn add_consecutive_vertices(&self, start: u32, count: usize) {
        if count == 0 {
            return;
        }
        self.write_data(|d| {
            d.append_run(start, count);
            d.touch();
        });
    }

    /// Append the `count` vertices following the last one added
    pub fn add_next_vertices(&self, count: usize) {
        let data = self.data();
        let start = match data.num_vertices() {
            0 => 0,
            n => data.vertex_unchecked(n - 1) + 1,
        };
        self.add_consecutive_vertices(start, count);
    }

    /// Mark the vertices added since the previous close as one primitive
    ///
    /// Variable-size topologies record a boundary and need at least the
    /// topology's minimum vertex count; fixed-size topologies only check that
    /// a whole number of primitives was added.
    pub fn close_primitive(&self) -> GeomResult<()> {
        let result = self.write_data(PrimitiveData::close_primitive);
        if let Err(err) = &result {
            log::error!("close_primitive on {} primitive {}: {}", self.topology, self.id, err);
        }
        result
    }

    /// Remove every vertex and primitive
    pub fn clear_vertices(&self) {
        self.write_data(|d| {
            d.first_vertex = 0;
            d.num_vertices = 0;
            d.vertices = None;
            d.ends = Arc::new(Vec::new());
            d.touch();
        });
    }

    /// Add `offset` to every referenced vertex
    pub fn offset_vertices(&self, offset: i64) -> GeomResult<()> {
        self.write_data(|d| {
            if d.num_vertices() == 0 {
                return Ok(());
            }
            for vertex in [d.min_vertex(), d.max_vertex()] {
                let moved = i64::from(vertex) + offset;
                if moved < 0 || moved > i64::from(u32::MAX) {
                    return Err(GeomError::OffsetOutOfRange { offset, vertex });
                }
            }
            let shift = |v: u32| (i64::from(v) + offset) as u32;
            if let Some(vertices) = &d.vertices {
                let moved = index_array_from(vertices.index_type(), vertices.iter().map(shift));
                d.index_type = moved.index_type();
                d.vertices = Some(Arc::new(moved));
            } else {
                d.first_vertex = shift(d.first_vertex);
            }
            d.touch();
            Ok(())
        })
    }

    /// Convert to indexed storage numbered from the first vertex
    pub fn make_indexed(&self) {
        if self.is_indexed() {
            return;
        }
        self.write_data(|d| {
            d.indices_mut();
            d.touch();
        });
    }

    /// Replace the index table
    pub fn set_vertices(&self, vertices: Arc<IndexArray>) {
        self.write_data(|d| {
            d.index_type = vertices.index_type();
            d.vertices = Some(vertices);
            d.touch();
        });
    }

    /// Become non-indexed over `first..first + count`
    pub fn set_nonindexed_vertices(&self, first: u32, count: usize) {
        self.write_data(|d| {
            d.vertices = None;
            d.first_vertex = first;
            d.num_vertices = count;
            d.touch();
        });
    }

    /// Replace the primitive boundary table
    pub fn set_ends(&self, ends: Vec<usize>) {
        self.write_data(|d| {
            d.ends = Arc::new(ends);
            d.touch();
        });
    }

    /// Edit the index table in place, promoting to indexed if needed
    pub fn modify_vertices<R>(&self, f: impl FnOnce(&mut IndexArray) -> R) -> R {
        self.write_data(|d| {
            let indices = d.indices_mut();
            let result = f(indices);
            d.index_type = indices.index_type();
            d.touch();
            result
        })
    }

    /// Copy every referenced row of `source` onto the end of `dest` and
    /// reference the copies as a non-indexed run
    pub fn make_nonindexed(&self, dest: &mut VertexData, source: &VertexData) -> GeomResult<()> {
        let data = self.data();
        check_row_copy(&data, dest, source)?;

        let num_vertices = data.num_vertices();
        let dest_start = dest.num_rows();
        dest.set_num_rows(dest_start + num_vertices);
        for (i, vertex) in data.vertex_iter().enumerate() {
            dest.copy_row_from(dest_start + i, source, vertex as usize)?;
        }
        self.set_nonindexed_vertices(dest_start as u32, num_vertices);
        Ok(())
    }

    /// Copy the referenced rows of `source` onto the end of `dest`, once per
    /// distinct row, and rewrite the indices to point at the copies
    pub fn pack_vertices(&self, dest: &mut VertexData, source: &VertexData) -> GeomResult<()> {
        let data = self.data();
        if !data.is_indexed() {
            return self.make_nonindexed(dest, source);
        }
        check_row_copy(&data, dest, source)?;

        let dest_start = dest.num_rows();
        let mut copied: HashMap<u32, u32> = HashMap::new();
        let mut packed = IndexArray::new(data.index_type()).unwrap_or_default();
        for vertex in data.vertex_iter() {
            let next = copied.len() as u32;
            let slot = *copied.entry(vertex).or_insert(next);
            let dest_row = dest_start as u32 + slot;
            if slot == next {
                dest.copy_row_from(dest_row as usize, source, vertex as usize)?;
            }
            packed.push_widening(dest_row);
        }
        log::trace!(
            "packed {} indices into {} rows for {} primitive {}",
            data.num_vertices(),
            copied.len(),
            self.topology,
            self.id
        );
        self.set_vertices(Arc::new(packed));
        Ok(())
    }

    /// Whether every referenced vertex exists in `vertex_data`
    pub fn check_valid(&self, vertex_data: &VertexData) -> bool {
        let data = self.data();
        data.num_vertices() == 0 || (data.max_vertex() as usize) < vertex_data.num_rows()
    }

    /// Bounding box of the referenced vertex positions, optionally transformed
    ///
    /// Returns `None` when the data has no vertex column or nothing is
    /// referenced.
    pub fn calc_tight_bounds(
        &self,
        vertex_data: &VertexData,
        mat: Option<&Mat4>,
    ) -> GeomResult<Option<(Point3, Point3)>> {
        let Ok(mut reader) = vertex_data.reader(VERTEX) else {
            return Ok(None);
        };
        let data = self.data();
        let mut bounds: Option<(Point3, Point3)> = None;
        for vertex in data.vertex_iter() {
            reader.set_row(vertex as usize);
            let mut point = reader.get_point()?;
            if let Some(mat) = mat {
                point = mat.xform_point(&point);
            }
            bounds = Some(match bounds {
                Some((lo, hi)) => (utils::min_point(&lo, &point), utils::max_point(&hi, &point)),
                None => (point, point),
            });
        }
        Ok(bounds)
    }

    /// Break a complex topology into its simple counterpart
    ///
    /// Strips and fans become triangles, line strips become lines. Other
    /// topologies come back as the same `Arc`.
    pub fn decompose(self: &Arc<Self>) -> Arc<Self> {
        let Some(target) = self.topology.decomposed() else {
            return Arc::clone(self);
        };
        log::debug!("decomposing {} primitive {} into {}", self.topology, self.id, target);

        let data = self.data();
        let flat_first = data.shade_model() == ShadeModel::FlatFirstVertex;
        let mut indices = Vec::with_capacity(data.num_vertices() * 3);
        for n in 0..data.num_primitives() {
            let Ok(v) = data.primitive_vertices(n) else {
                continue;
            };
            match self.topology {
                PrimitiveTopology::TriStrips => {
                    for i in 0..v.len().saturating_sub(2) {
                        let triangle = if i % 2 == 0 {
                            [v[i], v[i + 1], v[i + 2]]
                        } else if flat_first {
                            [v[i], v[i + 2], v[i + 1]]
                        } else {
                            [v[i + 1], v[i], v[i + 2]]
                        };
                        indices.extend_from_slice(&triangle);
                    }
                }
                PrimitiveTopology::TriFans => {
                    for i in 1..v.len().saturating_sub(1) {
                        indices.extend_from_slice(&[v[0], v[i], v[i + 1]]);
                    }
                }
                _ => {
                    for pair in v.windows(2) {
                        indices.extend_from_slice(pair);
                    }
                }
            }
        }
        Arc::new(self.derived(target, data.shade_model(), indices))
    }

    /// Reorder vertices to swap between flat-first and flat-last shading
    ///
    /// Returns the same `Arc` when the topology cannot be rotated or the
    /// primitive is not flat shaded.
    pub fn rotate(self: &Arc<Self>) -> Arc<Self> {
        let data = self.data();
        let shade_model = data.shade_model();
        let flat = matches!(shade_model, ShadeModel::FlatFirstVertex | ShadeModel::FlatLastVertex);
        if !self.topology.can_rotate() || !flat {
            return Arc::clone(self);
        }
        log::debug!("rotating {} primitive {}", self.topology, self.id);

        let vertices: Vec<u32> = data.vertex_iter().collect();
        let mut rotated = Vec::with_capacity(vertices.len());
        match self.topology {
            PrimitiveTopology::Triangles => {
                for tri in vertices.chunks_exact(3) {
                    let order = if shade_model == ShadeModel::FlatFirstVertex {
                        [tri[1], tri[2], tri[0]]
                    } else {
                        [tri[2], tri[0], tri[1]]
                    };
                    rotated.extend_from_slice(&order);
                }
            }
            PrimitiveTopology::Lines => {
                for line in vertices.chunks_exact(2) {
                    rotated.extend_from_slice(&[line[1], line[0]]);
                }
            }
            _ => {
                let mut start = 0;
                for &end in data.ends() {
                    let end = end.min(vertices.len());
                    rotated.extend(vertices[start.min(end)..end].iter().rev());
                    start = end;
                }
            }
        }

        let mut d = (*data).clone();
        let indices = index_array_from(d.index_type, rotated);
        d.index_type = indices.index_type();
        d.vertices = Some(Arc::new(indices));
        d.shade_model = shade_model.flipped();
        d.touch();
        Arc::new(Self::from_data(self.topology, d, self.num_stages()))
    }

    /// A primitive compatible with `shade_model`, if one exists
    ///
    /// Uniform shading matches anything; opposite flat conventions are
    /// reconciled by rotation.
    pub fn match_shade_model(self: &Arc<Self>, shade_model: ShadeModel) -> Option<Arc<Self>> {
        let current = self.shade_model();
        if current == shade_model || current == ShadeModel::Uniform || shade_model == ShadeModel::Uniform {
            return Some(Arc::clone(self));
        }
        let opposite_flat = matches!(
            (current, shade_model),
            (ShadeModel::FlatFirstVertex, ShadeModel::FlatLastVertex)
                | (ShadeModel::FlatLastVertex, ShadeModel::FlatFirstVertex)
        );
        if opposite_flat {
            let rotated = self.rotate();
            return (!Arc::ptr_eq(&rotated, self)).then_some(rotated);
        }
        None
    }

    fn derived(&self, topology: PrimitiveTopology, shade_model: ShadeModel, indices: Vec<u32>) -> Self {
        let data = self.data();
        let settings = PrimitiveSettings {
            usage_hint: data.usage_hint(),
            index_type: data.index_type(),
            shade_model,
            num_stages: self.num_stages(),
        };
        let mut d = PrimitiveData::new(topology, &settings);
        let indices = index_array_from(d.index_type, indices);
        d.index_type = indices.index_type();
        d.vertices = Some(Arc::new(indices));
        d.touch();
        Self::from_data(topology, d, settings.num_stages)
    }

    /// A fresh primitive whose every stage starts from `data`
    fn from_data(topology: PrimitiveTopology, data: PrimitiveData, num_stages: usize) -> Self {
        Self {
            id: PRIMITIVE_IDS.allocate(),
            topology,
            cycler: PipelineCycler::new(data, num_stages),
            prepared: Mutex::new(Vec::new()),
        }
    }

    // Backend residency

    /// Queue the index buffer for upload on `prepared` at the next frame
    pub fn prepare(&self, prepared: &Arc<PreparedObjects>) {
        prepared.enqueue_index_buffer(self.id);
    }

    /// Upload the index buffer to `prepared` now, or return the resident one
    ///
    /// Non-indexed primitives have nothing to upload.
    pub fn prepare_now(&self, prepared: &Arc<PreparedObjects>) -> Option<IndexBufferContext> {
        let data = self.data();
        let vertices = data.vertices()?;
        let context = prepared.prepare_index_buffer_now(self.id, vertices.data_size_bytes(), data.modified());

        let mut tables = self.prepared.lock();
        tables.retain(|table| table.strong_count() > 0);
        let known = tables
            .iter()
            .any(|table| table.upgrade().is_some_and(|table| table.id() == prepared.id()));
        if !known {
            tables.push(Arc::downgrade(prepared));
        }
        Some(context)
    }

    /// Whether an index buffer is resident on `prepared`
    pub fn is_prepared(&self, prepared: &PreparedObjects) -> bool {
        prepared.is_index_buffer_prepared(self.id)
    }

    /// Free the index buffer on one table, or drop it from its upload queue
    pub fn release(&self, prepared: &Arc<PreparedObjects>) -> bool {
        let mut tables = self.prepared.lock();
        let before = tables.len();
        tables.retain(|table| table.upgrade().is_some_and(|table| table.id() != prepared.id()));
        if tables.len() != before && prepared.release_index_buffer(self.id) {
            return true;
        }
        prepared.dequeue_index_buffer(self.id)
    }

    /// Free the index buffer on every table; returns how many were freed
    pub fn release_all(&self) -> usize {
        let tables: Vec<_> = self.prepared.lock().drain(..).collect();
        tables
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|table| table.release_index_buffer(self.id))
            .count()
    }

    /// Per-primitive listing, connector vertices shown after each primitive
    pub fn write(&self, out: &mut dyn fmt::Write, indent: usize) -> fmt::Result {
        let data = self.data();
        let kind = if data.is_indexed() { "indexed" } else { "nonindexed" };
        writeln!(out, "{:indent$}{} ({}):", "", self.topology, kind, indent = indent)?;

        let num_vertices = data.num_vertices();
        let unused = self.topology.num_unused_vertices_per_primitive();
        for n in 0..data.num_primitives() {
            let (Ok(start), Ok(end)) = (data.primitive_start(n), data.primitive_end(n)) else {
                break;
            };
            write!(out, "{:indent$}[", "", indent = indent + 2)?;
            for i in start..end {
                write!(out, " {}", data.vertex_unchecked(i))?;
            }
            write!(out, " ]")?;
            if end < num_vertices {
                for i in end..end + unused {
                    if i < num_vertices {
                        write!(out, " {}", data.vertex_unchecked(i))?;
                    } else {
                        write!(out, " ?")?;
                    }
                }
            }
            writeln!(out)?;
        }
        Ok(())
    }
}

fn index_array_from(index_type: NumericType, values: impl IntoIterator<Item = u32>) -> IndexArray {
    let mut indices = IndexArray::new(index_type).unwrap_or_default();
    for value in values {
        indices.push_widening(value);
    }
    indices
}

fn check_row_copy(data: &PrimitiveData, dest: &VertexData, source: &VertexData) -> GeomResult<()> {
    if dest.format().id() != source.format().id() {
        return Err(GeomError::FormatMismatch {
            source_format: source.format().id(),
            dest_format: dest.format().id(),
        });
    }
    if data.num_vertices() > 0 && data.max_vertex() as usize >= source.num_rows() {
        return Err(GeomError::RowOutOfRange {
            row: data.max_vertex() as usize,
            limit: source.num_rows(),
        });
    }
    Ok(())
}

impl Clone for GeomPrimitive {
    fn clone(&self) -> Self {
        self.make_copy()
    }
}

impl Drop for GeomPrimitive {
    fn drop(&mut self) {
        let freed = self.release_all();
        if freed > 0 {
            log::trace!("released {} index buffers of primitive {}", freed, self.id);
        }
    }
}

impl fmt::Display for GeomPrimitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data();
        write!(f, "{}, {}, {}", self.topology, data.num_primitives(), data.num_vertices())
    }
}
