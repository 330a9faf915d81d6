// Case Generation
// Composes expansion, naming, rendering, and materialization into one pass:
// every valid combination becomes a self-contained case directory under the
// output root. Name collisions are rejected before any directory is touched.

use std::collections::HashMap;
use std::path::Path;

use crate::cases::{write_case, CaseDescriptor};
use crate::error::{SweepError, SweepResult};
use crate::execution::config::GenerationConfig;
use crate::execution::events::{EventSender, ProgressSender, SweepEvent};
use crate::matrix::MatrixExpander;
use crate::naming::case_name;
use crate::template::{add_checkpoint, extract_end_time, render_case};

/// Generation pipeline bound to one configuration.
pub struct CaseGenerator {
    config: GenerationConfig,
    event_tx: Option<ProgressSender>,
}

impl CaseGenerator {
    pub fn new(config: GenerationConfig) -> Self {
        Self {
            config,
            event_tx: None,
        }
    }

    /// Set progress event sender
    pub fn with_progress(mut self, tx: ProgressSender) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Materialize one case directory per valid combination. A write failure
    /// on the first case is fatal (the output root itself is unusable); later
    /// write failures are diagnosed and that case is skipped.
    pub fn generate(&self) -> SweepResult<Vec<CaseDescriptor>> {
        let config = &self.config;

        let main_text = read_template(&config.main_template)?;
        let coupled = config
            .sub_template
            .as_deref()
            .is_some_and(|sub| sub != config.main_template);
        let sub_text = match (&config.sub_template, coupled) {
            (Some(path), true) => Some(read_template(path)?),
            _ => None,
        };

        let end_time = extract_end_time(&main_text).or(config.fallback_end_time);
        let main_text = add_checkpoint(
            &main_text,
            config.checkpoint.time_step_interval,
            config.checkpoint.num_files,
            config.checkpoint.wall_seconds,
        );

        let combinations = MatrixExpander::expand(&config.matrix, &config.exclusions)?;

        // Two-character name prefixes can collide between distinct
        // combinations; a silent overwrite would lose a case, so reject the
        // whole sweep before any directory exists.
        let mut seen: HashMap<String, usize> = HashMap::new();
        let names: Vec<String> = combinations.iter().map(case_name).collect();
        for (i, name) in names.iter().enumerate() {
            if let Some(&first) = seen.get(name) {
                return Err(SweepError::Configuration(format!(
                    "case name collision: combinations {} and {} both map to '{}'",
                    first + 1,
                    i + 1,
                    name
                )));
            }
            seen.insert(name.clone(), i);
        }

        if config.clean_output {
            match std::fs::remove_dir_all(&config.output_dir) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(SweepError::io(&config.output_dir, e)),
            }
        }
        std::fs::create_dir_all(&config.output_dir)
            .map_err(|e| SweepError::io(&config.output_dir, e))?;

        self.event_tx.send_event(SweepEvent::GenerationStarted {
            total_combinations: combinations.len(),
            coupled,
        });

        let mut cases = Vec::with_capacity(combinations.len());
        for (i, (combination, name)) in combinations.iter().zip(&names).enumerate() {
            let index = i + 1;
            let sub_file_name = coupled.then(|| format!("sub_{}.{}", name, config.extension));
            let rendered_main = render_case(
                &main_text,
                combination,
                end_time,
                sub_file_name.as_deref(),
            );
            let rendered_sub = sub_text
                .as_deref()
                .map(|text| render_case(text, combination, end_time, None));

            match write_case(
                &config.output_dir,
                index,
                name,
                &rendered_main,
                rendered_sub.as_deref(),
                &config.extension,
            ) {
                Ok(descriptor) => {
                    self.event_tx.send_event(SweepEvent::CaseGenerated {
                        index,
                        name: name.clone(),
                    });
                    cases.push(descriptor);
                }
                Err(e) if index == 1 => return Err(e),
                Err(e) => {
                    eprintln!("warning: skipping case {} ({}): {}", index, name, e);
                    self.event_tx.send_event(SweepEvent::warning(format!(
                        "skipping case {} ({}): {}",
                        index, name, e
                    )));
                }
            }
        }

        Ok(cases)
    }
}

fn read_template(path: &Path) -> SweepResult<String> {
    std::fs::read_to_string(path).map_err(|e| SweepError::template(path, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::config::CheckpointConfig;
    use crate::matrix::{ExclusionRule, ParameterMatrix};
    use std::path::PathBuf;

    const MAIN_TEMPLATE: &str = "\
[Materials]
  Gf = 10
  length_scale_paramete = 2e-5
[]

[Executioner]
  end_time = 8.64e6
[]

[Outputs]
  [exodus]
    type = Exodus
  []
[]
";

    const SUB_TEMPLATE: &str = "\
[Materials]
  Gf = 10
[]
";

    fn write_templates(dir: &Path) -> (PathBuf, PathBuf) {
        let main = dir.join("main_template.i");
        let sub = dir.join("sub_template.i");
        std::fs::write(&main, MAIN_TEMPLATE).unwrap();
        std::fs::write(&sub, SUB_TEMPLATE).unwrap();
        (main, sub)
    }

    fn sample_config(dir: &Path) -> GenerationConfig {
        let (main, _) = write_templates(dir);
        let mut matrix = ParameterMatrix::new();
        matrix.insert("Gf", vec![8.0, 10.0]);
        matrix.insert("length_scale_paramete", vec![5e-5, 10e-5]);
        GenerationConfig {
            output_dir: dir.join("sweep"),
            main_template: main,
            sub_template: None,
            matrix,
            exclusions: vec![ExclusionRule::new(vec![
                ("Gf".to_string(), 10.0),
                ("length_scale_paramete".to_string(), 5e-5),
            ])],
            checkpoint: CheckpointConfig::default(),
            fallback_end_time: None,
            clean_output: false,
            extension: "i".to_string(),
        }
    }

    #[test]
    fn test_generate_excluded_matrix() {
        let dir = tempfile::tempdir().unwrap();
        let config = sample_config(dir.path());
        let cases = CaseGenerator::new(config).generate().unwrap();

        assert_eq!(cases.len(), 3);
        for (i, case) in cases.iter().enumerate() {
            assert_eq!(case.index, i + 1);
            let dir_name = case.dir.file_name().unwrap().to_str().unwrap();
            assert!(dir_name.starts_with(&format!("case_{:03}_", i + 1)));

            let text = std::fs::read_to_string(&case.main_file).unwrap();
            assert!(text.contains("# Gf: "));
            assert!(text.contains("# length_scale_paramete: "));
            assert!(text.contains("# end_time = 8.64e6"));
            assert!(text.contains("type = Checkpoint"));
        }
    }

    #[test]
    fn test_generate_substitutes_values() {
        let dir = tempfile::tempdir().unwrap();
        let config = sample_config(dir.path());
        let cases = CaseGenerator::new(config).generate().unwrap();

        let first = std::fs::read_to_string(&cases[0].main_file).unwrap();
        assert!(first.contains("  Gf = 8\n"));
        assert!(first.contains("  length_scale_paramete = 5e-5\n"));
    }

    #[test]
    fn test_generate_coupled_mode() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = sample_config(dir.path());
        config.sub_template = Some(dir.path().join("sub_template.i"));

        let cases = CaseGenerator::new(config).generate().unwrap();
        assert!(cases.iter().all(|c| c.multi_app));
        let sub = cases[0].sub_file.as_ref().unwrap();
        let text = std::fs::read_to_string(sub).unwrap();
        assert!(text.contains("Gf = 8"));
    }

    #[test]
    fn test_sub_template_equal_to_main_is_single_app() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = sample_config(dir.path());
        config.sub_template = Some(config.main_template.clone());

        let cases = CaseGenerator::new(config).generate().unwrap();
        assert!(cases.iter().all(|c| !c.multi_app));
    }

    #[test]
    fn test_collision_rejected_before_materialization() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = sample_config(dir.path());
        // Duplicate axis values produce identical names.
        let mut matrix = ParameterMatrix::new();
        matrix.insert("Gf", vec![8.0, 8.0]);
        config.matrix = matrix;
        config.exclusions.clear();

        let result = CaseGenerator::new(config.clone()).generate();
        assert!(matches!(result, Err(SweepError::Configuration(_))));
        assert!(!config.output_dir.exists());
    }

    #[test]
    fn test_missing_template_is_template_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = sample_config(dir.path());
        config.main_template = dir.path().join("missing.i");

        assert!(matches!(
            CaseGenerator::new(config).generate(),
            Err(SweepError::Template { .. })
        ));
    }

    #[test]
    fn test_fallback_end_time_used_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = sample_config(dir.path());
        std::fs::write(&config.main_template, "[Materials]\n  Gf = 10\n[]\n").unwrap();
        config.fallback_end_time = Some(100.0);

        let cases = CaseGenerator::new(config).generate().unwrap();
        let text = std::fs::read_to_string(&cases[0].main_file).unwrap();
        assert!(text.contains("# end_time = 100"));
    }

    #[test]
    fn test_clean_output_removes_stale_cases() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = sample_config(dir.path());
        let stale = config.output_dir.join("case_099_stale");
        std::fs::create_dir_all(&stale).unwrap();

        config.clean_output = true;
        CaseGenerator::new(config).generate().unwrap();
        assert!(!stale.exists());
    }
}
