//! Console report rendering and the machine-readable report document.

use crate::scenario::{ChainOutcome, ScenarioOutcome, Verdict};
use flopbench_common::system_info::{GpuPowerInfo, HostCpuInfo};
use serde::Serialize;
use std::fmt;

const RULE_WIDTH: usize = 68;

/// Boxed report header.
#[must_use]
pub fn header(title: &str) -> String {
    let bar = "═".repeat(RULE_WIDTH);
    format!("╔{bar}╗\n║ {title:<width$} ║\n╚{bar}╝", width = RULE_WIDTH - 2)
}

/// Section divider.
#[must_use]
pub fn section(title: &str) -> String {
    format!("═══ {title} ═══")
}

impl fmt::Display for ScenarioOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        match (self.stats.avg_ms(), self.stats.min_ms(), self.stats.max_ms()) {
            (Some(avg), Some(min), Some(max)) => {
                writeln!(f, "  time (avg/min/max): {avg:.3} / {min:.3} / {max:.3} ms")?;
            }
            _ => writeln!(f, "  time:               no completed runs")?,
        }
        writeln!(f, "  throughput:         {:.2} GFLOPS", self.gflops)?;
        if let Some(bw) = self.bandwidth_gbps {
            writeln!(f, "  bandwidth:          {bw:.2} GB/s")?;
        }
        if let Some(profile) = &self.last_profile {
            writeln!(
                f,
                "  device timings:     queue {:.1} µs | dispatch {:.1} µs | exec {:.3} ms",
                profile.queue_latency().as_secs_f64() * 1e6,
                profile.dispatch_latency().as_secs_f64() * 1e6,
                profile.execution_time().as_secs_f64() * 1e3,
            )?;
        }
        match &self.verdict {
            Some(Verdict::Passed { value }) => {
                writeln!(f, "  correctness:        ✓ C[0][0] = {value:.4}")?;
            }
            Some(Verdict::Mismatch { measured, expected }) => {
                writeln!(
                    f,
                    "  correctness:        ✗ C[0][0] = {measured:.4}, expected {expected:.4}"
                )?;
            }
            None => {}
        }
        Ok(())
    }
}

impl fmt::Display for ChainOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        for (i, ms) in self.per_link_ms.iter().enumerate() {
            writeln!(f, "  kernel {i}: {ms:.2} ms")?;
        }
        writeln!(f, "  summed kernel time: {:.3} ms", self.summed_ms)?;
        writeln!(f, "  wall time:          {:.3} ms", self.wall_ms)?;
        writeln!(f, "  throughput:         {:.2} GFLOPS", self.gflops)
    }
}

/// The whole run, serializable for `--format json`.
#[derive(Debug, Serialize)]
pub struct ReportDocument {
    pub backend: String,
    pub host_cpu: HostCpuInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu_power: Option<GpuPowerInfo>,
    pub scenarios: Vec<ScenarioOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain: Option<ChainOutcome>,
}

impl ReportDocument {
    /// `true` when every verified scenario passed its spot-check.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.scenarios.iter().all(|s| !s.failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flopbench_common::stats::TimingStats;
    use std::time::Duration;

    fn outcome(failed: bool) -> ScenarioOutcome {
        let mut stats = TimingStats::new();
        stats.record(Duration::from_millis(10));
        ScenarioOutcome {
            name: "matrix multiply 512×512".to_owned(),
            stats,
            gflops: 26.8,
            bandwidth_gbps: Some(0.31),
            verdict: Some(if failed {
                Verdict::Mismatch { measured: 1.0, expected: 2.0 }
            } else {
                Verdict::Passed { value: 128.0132 }
            }),
            last_profile: None,
            failed,
        }
    }

    #[test]
    fn passed_scenario_renders_check_mark_and_timing() {
        let text = outcome(false).to_string();
        assert!(text.contains("✓ C[0][0] = 128.0132"));
        assert!(text.contains("time (avg/min/max)"));
        assert!(text.contains("26.80 GFLOPS"));
    }

    #[test]
    fn mismatch_still_renders_timing() {
        let text = outcome(true).to_string();
        assert!(text.contains("✗"));
        assert!(text.contains("expected 2.0000"));
        // Timing must survive a correctness failure.
        assert!(text.contains("time (avg/min/max)"));
    }

    #[test]
    fn header_is_boxed() {
        let h = header("CPU PARALLEL MATRIX MULTIPLICATION");
        assert!(h.starts_with('╔'));
        assert!(h.contains("CPU PARALLEL MATRIX MULTIPLICATION"));
        assert!(h.ends_with('╝'));
    }

    #[test]
    fn report_document_serializes_to_json() {
        let doc = ReportDocument {
            backend: "host CPU (8 threads)".to_owned(),
            host_cpu: HostCpuInfo { model: None, logical_cores: 8, governor: None },
            gpu_power: None,
            scenarios: vec![outcome(false)],
            chain: None,
        };
        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.contains("\"gflops\""));
        assert!(!json.contains("gpu_power"));
        assert!(doc.all_passed());
    }
}
