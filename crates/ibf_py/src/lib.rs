use ibf_core::{Filter, FilterParams, IbfError};
use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyBytes, PyList};

fn to_py_err(e: IbfError) -> PyErr {
    match e {
        IbfError::Io(e) => PyErr::new::<PyIOError, _>(format!("{}", e)),
        other => PyErr::new::<PyValueError, _>(format!("{}", other)),
    }
}

/// Default-family filter (BLAKE3 check hash, seeded XXH3 key hashes).
#[pyclass]
pub struct Ibf {
    params: FilterParams,
    filter: Filter,
}

#[pymethods]
impl Ibf {
    #[new]
    #[pyo3(signature = (cells, id_octets=32, hash_octets=4, hashes=3, seed=0))]
    pub fn new(cells: usize, id_octets: usize, hash_octets: usize, hashes: usize, seed: u64) -> PyResult<Self> {
        let params = FilterParams {
            cell_count: cells,
            id_sum_octets: id_octets,
            hash_sum_octets: hash_octets,
            key_hash_count: hashes,
            seed,
        };
        let filter = params.build().map_err(to_py_err)?;
        Ok(Self { params, filter })
    }

    pub fn insert(&mut self, id: &[u8]) -> PyResult<()> {
        self.filter.insert(id).map_err(to_py_err)
    }

    pub fn remove(&mut self, id: &[u8]) -> PyResult<()> {
        self.filter.remove(id).map_err(to_py_err)
    }

    pub fn has(&self, id: &[u8]) -> PyResult<bool> {
        self.filter.has(id).map_err(to_py_err)
    }

    pub fn additional(&self, id: &[u8]) -> PyResult<bool> {
        self.filter.additional(id).map_err(to_py_err)
    }

    pub fn missing(&self, id: &[u8]) -> PyResult<bool> {
        self.filter.missing(id).map_err(to_py_err)
    }

    pub fn subtract(&mut self, other: PyRef<'_, Ibf>) -> PyResult<()> {
        if self.params != other.params {
            return Err(PyErr::new::<PyValueError, _>("filters use different params"));
        }
        self.filter.subtract(&other.filter).map_err(to_py_err)
    }

    /// Returns `(additional, missing)` as lists of bytes; drains the filter.
    pub fn decode(&mut self, py: Python<'_>) -> PyResult<(PyObject, PyObject)> {
        let d = self.filter.decode().map_err(to_py_err)?;
        let add = PyList::new(py, d.additional.iter().map(|id| PyBytes::new(py, id)));
        let miss = PyList::new(py, d.missing.iter().map(|id| PyBytes::new(py, id)));
        Ok((add.into_py(py), miss.into_py(py)))
    }

    pub fn to_bytes(&self, py: Python<'_>) -> PyObject {
        PyBytes::new(py, self.filter.as_bytes()).into_py(py)
    }

    /// Replace the cells with a peer's wire buffer of the same params.
    pub fn from_bytes(&mut self, data: &[u8]) -> PyResult<()> {
        self.filter = self.params.build_with_buffer(data.to_vec()).map_err(to_py_err)?;
        Ok(())
    }

    pub fn __repr__(&self) -> String {
        format!(
            "Ibf(cells={}, id_octets={}, hash_octets={}, hashes={}, seed={})",
            self.params.cell_count,
            self.params.id_sum_octets,
            self.params.hash_sum_octets,
            self.params.key_hash_count,
            self.params.seed
        )
    }
}

#[pymodule]
fn ibf_py(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<Ibf>()?;
    Ok(())
}
