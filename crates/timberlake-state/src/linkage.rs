//! Relationships between jobs: pipeline siblings, file-based DAG edges,
//! input resolution and previous runs.

use crate::types::Job;
use std::collections::{HashMap, HashSet};
use timberlake_parsers::loose_job_id;

/// Sibling jobs from the same pipeline step family.
///
/// A sibling's full name carries the family right after the opening
/// bracket of its tag. Jobs without a family have no siblings.
pub fn related_jobs<'a>(job: &Job, all: impl IntoIterator<Item = &'a Job>) -> Vec<&'a Job> {
    let Some(family) = job.task_family.as_deref() else {
        return Vec::new();
    };
    all.into_iter()
        .filter(|j| j.full_name.find(family) == Some(1))
        .collect()
}

/// Producer to consumer edges between jobs that share a file.
///
/// For every path some job writes and some job reads, each (writer, reader)
/// pair becomes an edge. Self-loops are kept. Edges are unique and ordered
/// by the first appearance of their file.
pub fn link_by_file<'a>(jobs: impl IntoIterator<Item = &'a Job>) -> Vec<(String, String)> {
    let mut files: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut readers: HashMap<String, Vec<&str>> = HashMap::new();
    let mut writers: HashMap<String, Vec<&str>> = HashMap::new();

    for job in jobs {
        let Some(conf) = job.conf.as_ref() else {
            continue;
        };
        for input in conf.inputs() {
            readers.entry(input.clone()).or_default().push(&job.id);
            if seen.insert(input.clone()) {
                files.push(input);
            }
        }
        for output in conf.outputs() {
            writers.entry(output.clone()).or_default().push(&job.id);
            if seen.insert(output.clone()) {
                files.push(output);
            }
        }
    }

    let mut edges = Vec::new();
    let mut emitted: HashSet<(String, String)> = HashSet::new();
    for file in &files {
        let (Some(consumers), Some(producers)) = (readers.get(file), writers.get(file)) else {
            continue;
        };
        for consumer in consumers {
            for producer in producers {
                let edge = (producer.to_string(), consumer.to_string());
                if emitted.insert(edge.clone()) {
                    edges.push(edge);
                }
            }
        }
    }
    edges
}

/// Where one declared input of a job comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// Written by a sibling job
    Job { id: String, name: String },
    /// Not produced by any known sibling
    Path(String),
}

/// Resolve each input path of `job` to the sibling that writes it.
pub fn resolve_inputs<'a>(job: &Job, all: impl IntoIterator<Item = &'a Job>) -> Vec<InputSource> {
    let Some(conf) = job.conf.as_ref() else {
        return Vec::new();
    };

    // Later writers of the same path win.
    let mut producers: HashMap<String, &Job> = HashMap::new();
    for relative in related_jobs(job, all) {
        if let Some(rconf) = relative.conf.as_ref() {
            for output in rconf.outputs() {
                producers.insert(output, relative);
            }
        }
    }

    conf.inputs()
        .into_iter()
        .map(|input| match producers.get(&input) {
            Some(producer) => InputSource::Job {
                id: producer.id.clone(),
                name: producer.name.clone(),
            },
            None => InputSource::Path(input),
        })
        .collect()
}

/// Most recent earlier run of a job with the same name.
///
/// Candidates are jobs whose display name contains this job's name and that
/// started strictly before it.
pub fn previous_run<'a>(job: &Job, all: impl IntoIterator<Item = &'a Job>) -> Option<&'a Job> {
    let start = job.start_time?;
    all.into_iter()
        .filter(|j| j.name.contains(&job.name))
        .filter(|j| j.start_time.is_some_and(|s| s < start))
        .max_by_key(|j| j.start_time)
}

/// Find a job by id, ignoring the `application`/`job` prefix word.
pub fn find_job_loose<'a>(id: &str, all: impl IntoIterator<Item = &'a Job>) -> Option<&'a Job> {
    let wanted = loose_job_id(id.trim());
    all.into_iter().find(|j| loose_job_id(&j.id) == wanted)
}
