//! Per-variant driver: convert, cluster, then derive both layouts.
//!
//! Every step is best effort. A failing step is logged and the remaining
//! steps still run against whatever files exist; nothing is rolled back.

use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};

use crate::circle;
use crate::convert::{self, ConvertError};
use crate::graph;
use crate::invoke::{self, ClusterEngine};

/// Similarity metrics processed when none are given on the command line.
pub const DEFAULT_VARIANTS: [&str; 3] = [
    "cosine_similarity",
    "jaccard_similarity",
    "edit_value_similarity",
];

/// Threshold handed to the clustering tool by default.
pub const DEFAULT_THRESHOLD: f64 = 0.01;

/// Files read and written for one variant, all inside the results directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantPaths {
    pub csv: PathBuf,
    pub scores: PathBuf,
    pub clusters: PathBuf,
    pub circle: PathBuf,
    pub graph: PathBuf,
}

impl VariantPaths {
    pub fn new(results_dir: &Path, variant: &str) -> Self {
        VariantPaths {
            csv: results_dir.join(format!("{}.csv", variant)),
            scores: results_dir.join(format!("{}.txt", variant)),
            clusters: results_dir.join(format!("{}_clusters.json", variant)),
            circle: results_dir.join(format!("{}_circle.json", variant)),
            graph: results_dir.join(format!("{}_cluster_d3.json", variant)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub results_dir: PathBuf,
    pub threshold: f64,
    pub variants: Vec<String>,
}

impl PipelineConfig {
    pub fn new(results_dir: impl Into<PathBuf>) -> Self {
        PipelineConfig {
            results_dir: results_dir.into(),
            threshold: DEFAULT_THRESHOLD,
            variants: DEFAULT_VARIANTS.iter().map(|v| v.to_string()).collect(),
        }
    }
}

/// Which steps succeeded for a processed variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Lines written by the converter, `None` if conversion failed.
    pub records: Option<usize>,
    pub clustered: bool,
    pub circle: bool,
    pub graph: bool,
}

impl StepReport {
    pub fn is_complete(&self) -> bool {
        self.records.is_some() && self.clustered && self.circle && self.graph
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantOutcome {
    /// No CSV was present for the variant.
    Skipped,
    Processed(StepReport),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantReport {
    pub variant: String,
    pub outcome: VariantOutcome,
}

impl VariantReport {
    /// A processed variant with at least one failed step.
    pub fn has_failure(&self) -> bool {
        match &self.outcome {
            VariantOutcome::Skipped => false,
            VariantOutcome::Processed(steps) => !steps.is_complete(),
        }
    }
}

/// Run every configured variant in order.
pub fn run<E>(config: &PipelineConfig, engine: &E) -> Vec<VariantReport>
where
    E: ClusterEngine + ?Sized,
{
    config
        .variants
        .iter()
        .map(|variant| VariantReport {
            variant: variant.clone(),
            outcome: run_variant(config, engine, variant),
        })
        .collect()
}

fn run_variant<E>(config: &PipelineConfig, engine: &E, variant: &str) -> VariantOutcome
where
    E: ClusterEngine + ?Sized,
{
    info!("===== Processing {} =====", variant);
    let paths = VariantPaths::new(&config.results_dir, variant);
    if !paths.csv.exists() {
        warn!("CSV file not found: {}", paths.csv.display());
        return VariantOutcome::Skipped;
    }

    let mut steps = StepReport::default();

    info!("Converting CSV to similarity scores format");
    match convert::convert(&paths.csv, &paths.scores) {
        Ok(count) => steps.records = Some(count),
        Err(e @ ConvertError::NoRecords(_)) => warn!("{}", e),
        Err(e) => error!("Error converting {}: {}", paths.csv.display(), e),
    }

    info!("Generating clusters for {}", variant);
    match invoke::invoke(
        engine,
        &config.results_dir,
        &paths.scores,
        &paths.clusters,
        config.threshold,
    ) {
        Ok(run) => {
            if !run.exit.success {
                warn!("Using {} despite {}", run.output.display(), run.exit);
            }
            steps.clustered = true;
        }
        Err(e) => error!("Clustering failed for {}: {}", variant, e),
    }

    info!("Creating circle packing visualization data");
    match circle::write_circle(&paths.clusters, &paths.circle) {
        Ok(packing) => {
            debug!("{} clusters packed", packing.children.len());
            steps.circle = true;
        }
        Err(e) => error!("Error creating circle packing: {}", e),
    }

    info!("Creating force graph visualization data");
    match graph::write_graph(&paths.clusters, &paths.graph) {
        Ok(force) => {
            debug!("{} nodes, {} links", force.nodes.len(), force.links.len());
            steps.graph = true;
        }
        Err(e) => error!("Error creating force graph: {}", e),
    }

    VariantOutcome::Processed(steps)
}

/// Log where the outputs went and how many variants completed.
pub fn log_summary(results_dir: &Path, reports: &[VariantReport]) {
    info!("JSON files generated in: {}", results_dir.display());
    info!("The following files can be used with the visualization pages:");
    info!("  *_clusters.json - Basic cluster visualization");
    info!("  *_circle.json - Circle packing visualization");
    info!("  *_cluster_d3.json - Force graph visualization");

    let skipped = reports
        .iter()
        .filter(|r| r.outcome == VariantOutcome::Skipped)
        .count();
    let failed: Vec<&str> = reports
        .iter()
        .filter(|r| r.has_failure())
        .map(|r| r.variant.as_str())
        .collect();
    let complete = reports.len() - skipped - failed.len();
    info!(
        "{} of {} variants complete, {} skipped",
        complete,
        reports.len(),
        skipped
    );
    if !failed.is_empty() {
        warn!("Variants with failed steps: {}", failed.join(", "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoke::{EngineExit, InvokeError, CLUSTER_ARTIFACT, STAGED_INPUT};
    use rstest::{fixture, rstest};
    use serde_json::{json, Value};
    use std::cell::RefCell;
    use std::fs;
    use tempfile::TempDir;

    const TREE: &str = r#"{"children":[{"children":[{"name":"a.txt","score":0.9}]}]}"#;

    /// Writes a fixed tree (or nothing) and remembers the scores it saw.
    struct StubEngine {
        tree: Option<&'static str>,
        inputs: RefCell<Vec<String>>,
    }

    impl StubEngine {
        fn new(tree: Option<&'static str>) -> Self {
            StubEngine {
                tree,
                inputs: RefCell::new(Vec::new()),
            }
        }
    }

    impl ClusterEngine for StubEngine {
        fn run(&self, staged_input: &Path, _: f64) -> Result<EngineExit, InvokeError> {
            assert!(staged_input.ends_with(STAGED_INPUT));
            self.inputs
                .borrow_mut()
                .push(fs::read_to_string(staged_input).unwrap());
            if let Some(tree) = self.tree {
                let dir = staged_input.parent().unwrap();
                fs::write(dir.join(CLUSTER_ARTIFACT), tree).unwrap();
            }
            Ok(EngineExit::ok())
        }
    }

    #[fixture]
    fn results() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("cosine_similarity.csv"),
            "file1,file2,score\na.txt,b.txt,0.9\nc.txt,d.txt,0.2\n",
        )
        .unwrap();
        dir
    }

    fn read_json(path: &Path) -> Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn variant_paths_follow_naming_scheme() {
        let paths = VariantPaths::new(Path::new("out"), "jaccard_similarity");
        assert_eq!(paths.csv, Path::new("out/jaccard_similarity.csv"));
        assert_eq!(paths.scores, Path::new("out/jaccard_similarity.txt"));
        assert_eq!(paths.clusters, Path::new("out/jaccard_similarity_clusters.json"));
        assert_eq!(paths.circle, Path::new("out/jaccard_similarity_circle.json"));
        assert_eq!(paths.graph, Path::new("out/jaccard_similarity_cluster_d3.json"));
    }

    #[rstest]
    fn processes_present_variants_and_skips_the_rest(results: TempDir) {
        let engine = StubEngine::new(Some(TREE));
        let reports = run(&PipelineConfig::new(results.path()), &engine);

        let outcomes: Vec<_> = reports.iter().map(|r| (r.variant.as_str(), &r.outcome)).collect();
        let complete = VariantOutcome::Processed(StepReport {
            records: Some(2),
            clustered: true,
            circle: true,
            graph: true,
        });
        assert_eq!(
            outcomes,
            vec![
                ("cosine_similarity", &complete),
                ("jaccard_similarity", &VariantOutcome::Skipped),
                ("edit_value_similarity", &VariantOutcome::Skipped),
            ]
        );
        assert!(reports.iter().all(|r| !r.has_failure()));
        assert_eq!(
            engine.inputs.borrow().as_slice(),
            ["a.txt,0.9,a.txt\nc.txt,0.2,c.txt\n"]
        );

        let paths = VariantPaths::new(results.path(), "cosine_similarity");
        assert_eq!(fs::read_to_string(&paths.clusters).unwrap(), TREE);
        assert_eq!(
            read_json(&paths.circle),
            json!({"name": "root", "children": [
                {"name": "Cluster 1", "children": [{"name": "a.txt", "size": 1810}]}
            ]})
        );
        assert_eq!(read_json(&paths.graph)["nodes"][2]["name"], "a.txt");
        assert!(!results.path().join(STAGED_INPUT).exists());
        assert!(!results.path().join(CLUSTER_ARTIFACT).exists());
    }

    #[rstest]
    fn clustering_failure_does_not_stop_later_steps(results: TempDir) {
        let paths = VariantPaths::new(results.path(), "cosine_similarity");
        // Left over from an earlier run.
        fs::write(&paths.clusters, TREE).unwrap();

        let engine = StubEngine::new(None);
        let reports = run(&PipelineConfig::new(results.path()), &engine);

        assert_eq!(
            reports[0].outcome,
            VariantOutcome::Processed(StepReport {
                records: Some(2),
                clustered: false,
                circle: true,
                graph: true,
            })
        );
        assert!(reports[0].has_failure());
        assert!(paths.circle.exists());
    }

    #[rstest]
    fn every_step_fails_without_usable_rows() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("jaccard_similarity.csv"), "file1,file2,score\n").unwrap();
        let mut config = PipelineConfig::new(dir.path());
        config.variants = vec!["jaccard_similarity".to_string()];

        let engine = StubEngine::new(None);
        let reports = run(&config, &engine);

        assert_eq!(
            reports,
            vec![VariantReport {
                variant: "jaccard_similarity".to_string(),
                outcome: VariantOutcome::Processed(StepReport::default()),
            }]
        );
        assert_eq!(engine.inputs.borrow().as_slice(), [""]);
    }

    #[rstest]
    fn threshold_reaches_the_engine(results: TempDir) {
        struct ThresholdProbe(RefCell<Vec<f64>>);

        impl ClusterEngine for ThresholdProbe {
            fn run(&self, staged_input: &Path, threshold: f64) -> Result<EngineExit, InvokeError> {
                self.0.borrow_mut().push(threshold);
                fs::write(staged_input.with_file_name(CLUSTER_ARTIFACT), "{}").unwrap();
                Ok(EngineExit::ok())
            }
        }

        let mut config = PipelineConfig::new(results.path());
        config.threshold = 0.25;
        let probe = ThresholdProbe(RefCell::new(Vec::new()));
        let reports = run(&config, &probe);

        assert_eq!(probe.0.borrow().as_slice(), [0.25]);
        assert!(!reports[0].has_failure());
    }
}
