//! Vector index backends.
//!
//! Both backends are append-only: vectors enter in insertion order and a
//! vector's position doubles as its insertion counter. Neither supports
//! in-place deletion; the store deletes by rebuilding a fresh index from
//! the surviving vectors. The backend is fixed when the store is
//! constructed, never chosen per call.

use anyhow::{bail, Result};

/// Nearest-neighbor retrieval over unit vectors by inner product.
pub trait VectorIndex: Send + Sync {
    fn dims(&self) -> usize;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Appends vectors in order. Every vector must have exactly `dims`
    /// components.
    fn add_batch(&mut self, vectors: &[Vec<f32>]) -> Result<()>;
    /// Returns up to `k` `(position, score)` pairs ordered by descending
    /// inner product against `query`.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>>;
    /// Returns a copy of the vector at `position`, if present.
    fn get(&self, position: usize) -> Option<Vec<f32>>;
    fn clear(&mut self);
}

/// Index strategy, parsed from configuration at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexBackend {
    /// Contiguous row-major matrix with exact top-k selection.
    Flat,
    /// Per-row storage with a full scan and sort. Slower but dependency- and
    /// layout-free; useful as a reference implementation.
    LinearScan,
}

impl IndexBackend {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "flat" => Ok(IndexBackend::Flat),
            "linear" => Ok(IndexBackend::LinearScan),
            other => bail!("Unknown index backend: '{}'. Must be flat or linear.", other),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IndexBackend::Flat => "flat",
            IndexBackend::LinearScan => "linear",
        }
    }
}

/// Allocates an empty index of the chosen backend.
pub fn create_index(backend: IndexBackend, dims: usize) -> Box<dyn VectorIndex> {
    match backend {
        IndexBackend::Flat => Box::new(FlatIndex::new(dims)),
        IndexBackend::LinearScan => Box::new(LinearScanIndex::new(dims)),
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

// ============ Flat index ============

/// Exact inner-product index over a contiguous row-major `Vec<f32>`.
/// Row `i` occupies `data[i * dims .. (i + 1) * dims]`.
pub struct FlatIndex {
    dims: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            data: Vec::new(),
        }
    }

    fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.dims..(i + 1) * self.dims]
    }
}

impl VectorIndex for FlatIndex {
    fn dims(&self) -> usize {
        self.dims
    }

    fn len(&self) -> usize {
        self.data.len() / self.dims
    }

    fn add_batch(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        for v in vectors {
            if v.len() != self.dims {
                bail!(
                    "vector dimension mismatch: expected {}, got {}",
                    self.dims,
                    v.len()
                );
            }
        }
        self.data.reserve(vectors.len() * self.dims);
        for v in vectors {
            self.data.extend_from_slice(v);
        }
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.dims {
            bail!(
                "query dimension mismatch: expected {}, got {}",
                self.dims,
                query.len()
            );
        }
        let n = self.len();
        let k = k.min(n);
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> =
            (0..n).map(|i| (i, dot(self.row(i), query))).collect();
        // Partial selection of the top k, then order just that prefix.
        if k < n {
            scored.select_nth_unstable_by(k - 1, |a, b| b.1.total_cmp(&a.1));
            scored.truncate(k);
        }
        scored.sort_unstable_by(|a, b| b.1.total_cmp(&a.1));
        Ok(scored)
    }

    fn get(&self, position: usize) -> Option<Vec<f32>> {
        if position < self.len() {
            Some(self.row(position).to_vec())
        } else {
            None
        }
    }

    fn clear(&mut self) {
        self.data.clear();
    }
}

// ============ Linear-scan index ============

/// Fallback backend: keeps each vector as its own row and answers queries by
/// scoring every row and sorting.
pub struct LinearScanIndex {
    dims: usize,
    rows: Vec<Vec<f32>>,
}

impl LinearScanIndex {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            rows: Vec::new(),
        }
    }
}

impl VectorIndex for LinearScanIndex {
    fn dims(&self) -> usize {
        self.dims
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn add_batch(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        for v in vectors {
            if v.len() != self.dims {
                bail!(
                    "vector dimension mismatch: expected {}, got {}",
                    self.dims,
                    v.len()
                );
            }
        }
        self.rows.extend(vectors.iter().cloned());
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.dims {
            bail!(
                "query dimension mismatch: expected {}, got {}",
                self.dims,
                query.len()
            );
        }
        let mut scored: Vec<(usize, f32)> = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| (i, dot(row, query)))
            .collect();
        scored.sort_unstable_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);
        Ok(scored)
    }

    fn get(&self, position: usize) -> Option<Vec<f32>> {
        self.rows.get(position).cloned()
    }

    fn clear(&mut self) {
        self.rows.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(dims: usize, hot: usize) -> Vec<f32> {
        let mut v = vec![0.0; dims];
        v[hot] = 1.0;
        v
    }

    fn both_backends(dims: usize) -> Vec<Box<dyn VectorIndex>> {
        vec![
            create_index(IndexBackend::Flat, dims),
            create_index(IndexBackend::LinearScan, dims),
        ]
    }

    #[test]
    fn backend_parse_round_trips() {
        assert_eq!(IndexBackend::parse("flat").unwrap(), IndexBackend::Flat);
        assert_eq!(
            IndexBackend::parse("linear").unwrap(),
            IndexBackend::LinearScan
        );
        assert!(IndexBackend::parse("hnsw").is_err());
    }

    #[test]
    fn top_k_is_ordered_descending() {
        for mut index in both_backends(4) {
            index
                .add_batch(&[unit(4, 0), unit(4, 1), unit(4, 2)])
                .unwrap();
            let query = vec![0.9, 0.5, 0.1, 0.0];
            let hits = index.search(&query, 2).unwrap();
            assert_eq!(hits.len(), 2);
            assert_eq!(hits[0].0, 0);
            assert_eq!(hits[1].0, 1);
            assert!(hits[0].1 >= hits[1].1);
        }
    }

    #[test]
    fn k_larger_than_len_returns_everything() {
        for mut index in both_backends(3) {
            index.add_batch(&[unit(3, 0), unit(3, 1)]).unwrap();
            let hits = index.search(&unit(3, 0), 10).unwrap();
            assert_eq!(hits.len(), 2);
        }
    }

    #[test]
    fn rejects_dimension_mismatch() {
        for mut index in both_backends(3) {
            assert!(index.add_batch(&[vec![1.0, 2.0]]).is_err());
            assert!(index.search(&[1.0, 2.0], 1).is_err());
        }
    }

    #[test]
    fn get_returns_stored_vector() {
        for mut index in both_backends(3) {
            index.add_batch(&[unit(3, 1)]).unwrap();
            assert_eq!(index.get(0).unwrap(), unit(3, 1));
            assert!(index.get(1).is_none());
        }
    }

    #[test]
    fn clear_empties_the_index() {
        for mut index in both_backends(2) {
            index.add_batch(&[unit(2, 0)]).unwrap();
            index.clear();
            assert!(index.is_empty());
            assert!(index.search(&unit(2, 0), 5).unwrap().is_empty());
        }
    }

    #[test]
    fn flat_and_linear_agree() {
        let mut flat = create_index(IndexBackend::Flat, 3);
        let mut linear = create_index(IndexBackend::LinearScan, 3);
        let vectors: Vec<Vec<f32>> = (0..20)
            .map(|i| {
                let mut v = vec![
                    (i as f32 * 0.37).sin(),
                    (i as f32 * 0.91).cos(),
                    (i as f32 * 0.13).sin(),
                ];
                crate::embedding::l2_normalize(&mut v);
                v
            })
            .collect();
        flat.add_batch(&vectors).unwrap();
        linear.add_batch(&vectors).unwrap();

        let query = vectors[7].clone();
        let a = flat.search(&query, 5).unwrap();
        let b = linear.search(&query, 5).unwrap();
        assert_eq!(
            a.iter().map(|(i, _)| *i).collect::<Vec<_>>(),
            b.iter().map(|(i, _)| *i).collect::<Vec<_>>()
        );
    }
}
