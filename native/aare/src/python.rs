//! PyO3 bindings.
//!
//! Exposes pattern translation, rulesets and compiled tables to the Python
//! policy tooling.

use crate::config::CompileOptions;
use crate::error::Error;
use crate::pattern::{convert_aaregex, filter_slashes};
use crate::rules::{RuleClass, Ruleset};
use crate::table::CompressedTable;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyBytes;

impl From<Error> for PyErr {
    fn from(err: Error) -> Self {
        PyValueError::new_err(err.to_string())
    }
}

fn options_from(flags: Vec<String>) -> PyResult<CompileOptions> {
    CompileOptions::from_flags(flags.iter().map(String::as_str))
        .map_err(|e| PyValueError::new_err(e.to_string()))
}

fn rule_class(name: &str) -> PyResult<RuleClass> {
    RuleClass::ALL
        .into_iter()
        .find(|class| class.to_string() == name)
        .ok_or_else(|| PyValueError::new_err(format!("unknown rule class '{name}'")))
}

/// Result of translating one policy pattern.
#[pyclass(name = "Translation", module = "aare", frozen, get_all)]
pub struct PyTranslation {
    regex: String,
    ptype: String,
    first_op: Option<usize>,
}

#[pymethods]
impl PyTranslation {
    fn __repr__(&self) -> String {
        format!("Translation({:?}, {})", self.regex, self.ptype)
    }
}

/// Translate a policy glob into an engine pattern.
#[pyfunction]
#[pyo3(name = "convert_aaregex", signature = (pattern, anchor = false, capacity = None))]
fn py_convert_aaregex(pattern: &str, anchor: bool, capacity: Option<usize>) -> PyResult<PyTranslation> {
    let capacity = capacity.unwrap_or_else(|| CompileOptions::default().pattern_capacity());
    let translation = convert_aaregex(pattern, anchor, capacity)?;
    Ok(PyTranslation {
        regex: translation.regex,
        ptype: translation.ptype.to_string(),
        first_op: translation.first_op,
    })
}

#[pyfunction]
#[pyo3(name = "filter_slashes")]
fn py_filter_slashes(path: &str) -> String {
    filter_slashes(path)
}

/// A ruleset under construction.
#[pyclass(name = "Ruleset", module = "aare")]
#[derive(Default)]
pub struct PyRuleset {
    inner: Ruleset,
}

#[pymethods]
impl PyRuleset {
    #[new]
    fn new() -> Self {
        Self::default()
    }

    /// Add a rule; `subpatterns` are engine patterns, not globs.
    #[pyo3(signature = (class_name, subpatterns, perms, audit = 0, deny = false))]
    fn add_rule(
        &mut self,
        class_name: &str,
        subpatterns: Vec<String>,
        perms: u32,
        audit: u32,
        deny: bool,
    ) -> PyResult<()> {
        let class = rule_class(class_name)?;
        self.inner.add_rule(class, subpatterns.as_slice(), deny, perms, audit)?;
        Ok(())
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }

    /// Compile the rules into a table, leaving this ruleset empty.
    #[pyo3(signature = (flags = Vec::new()))]
    fn create_dfa(&mut self, flags: Vec<String>) -> PyResult<PyTable> {
        let options = options_from(flags)?;
        let ruleset = std::mem::take(&mut self.inner);
        Ok(PyTable {
            inner: crate::create_dfa(ruleset, &options)?,
        })
    }
}

/// A compressed transition table.
#[pyclass(name = "Table", module = "aare", frozen)]
pub struct PyTable {
    inner: CompressedTable,
}

#[pymethods]
impl PyTable {
    /// The kernel-loadable blob.
    fn flex_table<'py>(&self, py: Python<'py>, name: &str) -> PyResult<Bound<'py, PyBytes>> {
        Ok(PyBytes::new(py, &self.inner.flex_table(name)?))
    }

    fn dump(&self) -> String {
        self.inner.dump()
    }

    /// `(accept, accept2)` of the state `input` leads to.
    fn lookup(&self, input: &[u8]) -> (u64, u64) {
        self.inner.lookup(input)
    }

    #[getter]
    fn num_states(&self) -> usize {
        self.inner.num_states()
    }

    fn __repr__(&self) -> String {
        let stats = self.inner.stats();
        format!(
            "Table(states={}, classes={}, entries={})",
            stats.states, stats.classes, stats.entries
        )
    }
}

/// Register the module contents.
pub fn aare(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyTranslation>()?;
    m.add_class::<PyRuleset>()?;
    m.add_class::<PyTable>()?;
    m.add_function(wrap_pyfunction!(py_convert_aaregex, m)?)?;
    m.add_function(wrap_pyfunction!(py_filter_slashes, m)?)?;
    Ok(())
}

#[pymodule]
#[pyo3(name = "aare")]
fn aare_module(m: &Bound<'_, PyModule>) -> PyResult<()> {
    aare(m)
}
