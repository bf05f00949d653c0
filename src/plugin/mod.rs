//! Content-inspection plugins
//!
//! Plugins get to look at every fetched resource and at every finished
//! report. Their notifications are fire-and-forget: return values are
//! ignored by the crawl core, but a plugin may log findings to the report
//! it is handed.

use crate::report::{Report, Scribe};

/// Hooks for inspecting fetched resources and finished reports.
///
/// All methods have empty default implementations, so a plugin only needs
/// to implement the notifications it cares about.
pub trait Plugin {
    /// Called once per successfully fetched resource, with the raw bytes
    /// and the Content-Type header value.
    fn resource_loaded(&mut self, data: &[u8], content_type: &str, report: &mut Report) {
        let _ = (data, content_type, report);
    }

    /// Called when the report for a request is finalized.
    fn report_added(&mut self, report: &Report) {
        let _ = report;
    }

    /// Called once at the end of the run.
    fn postprocess(&mut self, scribe: &Scribe) {
        let _ = scribe;
    }
}

/// Fans notifications out to a collection of plugins.
#[derive(Default)]
pub struct PluginCollection {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginCollection {
    pub fn new(plugins: Vec<Box<dyn Plugin>>) -> Self {
        Self { plugins }
    }

    pub fn resource_loaded(&mut self, data: &[u8], content_type: &str, report: &mut Report) {
        for plugin in &mut self.plugins {
            plugin.resource_loaded(data, content_type, report);
        }
    }

    pub fn report_added(&mut self, report: &Report) {
        for plugin in &mut self.plugins {
            plugin.report_added(report);
        }
    }

    pub fn postprocess(&mut self, scribe: &Scribe) {
        for plugin in &mut self.plugins {
            plugin.postprocess(scribe);
        }
    }
}
