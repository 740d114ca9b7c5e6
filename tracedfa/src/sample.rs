//! Samples of labeled traces, the input of the learning pipeline.
//!
//! A sample is a collection of finite words over string labels, each
//! classified as positive (to be accepted) or negative (to be rejected).
//! Samples are usually loaded from a directory of plain-text trace files:
//! one trace per line, labels separated by whitespace, and the file name
//! decides the classification — a name containing `OK` marks its traces
//! as positive, every other file as negative.

use std::hash::Hash;
use std::path::{Path, PathBuf};

use either::Either;
use itertools::Itertools;
use thiserror::Error;
use tracing::{debug, trace};

use crate::apta::Apta;
use crate::{Acceptor, ImpossibleTransition};

/// Problems while loading a sample from disk.
#[derive(Debug, Error)]
pub enum SampleError {
    /// The directory could not be read, or one of its files.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        /// The offending path.
        path: PathBuf,
        /// The underlying failure.
        source: std::io::Error,
    },
    /// The directory contributed no trace at all.
    #[error("no traces found in {}", .0.display())]
    EmptyDirectory(PathBuf),
}

/// Abstracts the types of errors that can occur when parsing a
/// [`TraceSample`] from its single-file form.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum SampleParseError {
    /// The `finite` header line is missing.
    #[error("missing sample header")]
    MissingHeader,
    /// The `positive:` or `negative:` block is missing.
    #[error("sample is malformed, missing `positive:` or `negative:` block")]
    MalformedSample,
    /// The same trace is classified both ways.
    #[error("sample is inconsistent: `{0}` is classified as positive and negative")]
    Inconsistent(String),
}

/// A finite sample: positive and negative example traces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceSample<L = String> {
    positive: Vec<Vec<L>>,
    negative: Vec<Vec<L>>,
}

impl<L> TraceSample<L>
where
    L: Clone + Eq + Hash,
{
    /// Creates a sample from an iterator of classified traces.
    pub fn new<W, I>(traces: I) -> Self
    where
        W: IntoIterator<Item = L>,
        I: IntoIterator<Item = (W, bool)>,
    {
        let (positive, negative) = traces.into_iter().partition_map(|(w, classification)| {
            if classification {
                Either::Left(w.into_iter().collect())
            } else {
                Either::Right(w.into_iter().collect())
            }
        });
        Self { positive, negative }
    }

    /// The positive traces.
    pub fn positive_words(&self) -> impl Iterator<Item = &[L]> {
        self.positive.iter().map(Vec::as_slice)
    }

    /// The negative traces.
    pub fn negative_words(&self) -> impl Iterator<Item = &[L]> {
        self.negative.iter().map(Vec::as_slice)
    }

    /// All traces with their classification.
    pub fn entries(&self) -> impl Iterator<Item = (&[L], bool)> {
        self.positive_words()
            .map(|w| (w, true))
            .chain(self.negative_words().map(|w| (w, false)))
    }

    /// Total number of traces.
    pub fn len(&self) -> usize {
        self.positive.len() + self.negative.len()
    }

    /// Whether the sample holds no trace.
    pub fn is_empty(&self) -> bool {
        self.positive.is_empty() && self.negative.is_empty()
    }

    /// The maximum length of any trace, 0 for an empty sample.
    pub fn max_word_len(&self) -> usize {
        self.entries().map(|(w, _)| w.len()).max().unwrap_or(0)
    }

    /// Grows a fresh APTA from every trace of the sample.
    pub fn to_apta(&self) -> Apta<L> {
        let mut apta = Apta::new();
        for word in &self.positive {
            apta.accept(word);
        }
        for word in &self.negative {
            apta.reject(word);
        }
        debug!(
            "grew an APTA with {} states from {} traces",
            apta.size(),
            self.len()
        );
        apta
    }
}

impl<L> TraceSample<L>
where
    L: Clone + Eq + Hash + std::fmt::Display,
{
    /// The fraction of traces the acceptor classifies like the sample,
    /// parsed strictly. Returns 1.0 for an empty sample.
    pub fn consistency<A>(&self, acceptor: &A) -> Result<f64, crate::ImpossibleTransition>
    where
        A: Acceptor<L>,
    {
        if self.is_empty() {
            return Ok(1.0);
        }
        let mut agreeing = 0usize;
        for (word, classification) in self.entries() {
            if acceptor.parse_binary(word, true)? == classification {
                agreeing += 1;
            }
        }
        Ok(agreeing as f64 / self.len() as f64)
    }
}

/// The fraction of traces on which all models answer alike, parsed
/// strictly. A single model or an empty trace collection trivially agrees
/// on everything.
pub fn compare_on_traces<'w, L, I>(
    traces: I,
    models: &[&dyn Acceptor<L>],
) -> Result<f64, ImpossibleTransition>
where
    L: 'w,
    I: IntoIterator<Item = &'w [L]>,
{
    let mut total = 0usize;
    let mut agreeing = 0usize;
    for trace in traces {
        total += 1;
        let mut verdicts = models.iter().map(|m| m.parse_binary(trace, true));
        let Some(reference) = verdicts.next() else {
            agreeing += 1;
            continue;
        };
        let reference = reference?;
        let mut all_agree = true;
        for verdict in verdicts {
            if verdict? != reference {
                all_agree = false;
                break;
            }
        }
        if all_agree {
            agreeing += 1;
        }
    }
    if total == 0 {
        return Ok(1.0);
    }
    Ok(agreeing as f64 / total as f64)
}

impl TraceSample<String> {
    /// Parses a sample from its single-file form.
    ///
    /// The file starts with a `finite` header line, followed by a
    /// `positive:` block and a `negative:` block, each holding one trace
    /// per line with labels separated by whitespace. Blank lines and `#`
    /// comments are skipped. Unlike the directory loader, this form is
    /// strict: a trace classified both ways is an error, and consistent
    /// duplicates are dropped.
    pub fn try_from_lines<I>(mut lines: I) -> Result<Self, SampleParseError>
    where
        I: Iterator<Item = String>,
    {
        if lines.next().unwrap_or_default().trim() != "finite" {
            return Err(SampleParseError::MissingHeader);
        }
        if lines.next().unwrap_or_default().trim() != "positive:" {
            return Err(SampleParseError::MalformedSample);
        }

        let mut words: crate::math::Map<Vec<String>, bool> = crate::math::Map::default();
        let mut in_negative = false;
        let mut saw_negative_block = false;
        for line in lines {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line == "negative:" {
                in_negative = true;
                saw_negative_block = true;
                continue;
            }
            let trace: Vec<String> = line.split_whitespace().map(str::to_owned).collect();
            let classification = !in_negative;
            if let Some(previous) = words.insert(trace.clone(), classification) {
                if previous != classification {
                    return Err(SampleParseError::Inconsistent(trace.join(" ")));
                }
                debug!("duplicate {line:?} dropped");
            }
        }
        if !saw_negative_block {
            return Err(SampleParseError::MalformedSample);
        }

        Ok(TraceSample::new(words))
    }

    /// Loads every regular file of `dir` as a trace file.
    ///
    /// Files are read in lexicographic name order so that loading is
    /// deterministic. Blank lines and lines starting with `#` are skipped.
    pub fn from_dir(dir: &Path) -> Result<Self, SampleError> {
        let entries = std::fs::read_dir(dir).map_err(|source| SampleError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let mut files: Vec<PathBuf> = entries
            .filter_map_ok(|e| e.path().is_file().then(|| e.path()))
            .collect::<Result<_, _>>()
            .map_err(|source| SampleError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        files.sort();

        let mut sample = TraceSample::default();
        for path in files {
            let positive = path
                .file_name()
                .map(|n| n.to_string_lossy().contains("OK"))
                .unwrap_or(false);
            let content = std::fs::read_to_string(&path).map_err(|source| SampleError::Io {
                path: path.clone(),
                source,
            })?;

            for line in content.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                let trace: Vec<String> = line.split_whitespace().map(str::to_owned).collect();
                trace!("read trace {trace:?}, positive: {positive}");
                if positive {
                    sample.positive.push(trace);
                } else {
                    sample.negative.push(trace);
                }
            }
        }

        if sample.is_empty() {
            return Err(SampleError::EmptyDirectory(dir.to_path_buf()));
        }
        debug!(
            "loaded {} positive and {} negative traces from {}",
            sample.positive.len(),
            sample.negative.len(),
            dir.display()
        );
        Ok(sample)
    }
}
