//! Prometheus text exposition format.
//!
//! Collectors push descriptors and gauge samples into a [`MetricSink`]; the
//! [`Exposition`] sink groups them into families and renders the text format
//! scraped by a Prometheus server or compatible agent.

use std::collections::HashMap;

/// Shape of a metric family: fully-qualified name, help text, label names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDesc {
    pub name: String,
    pub help: String,
    pub labels: Vec<String>,
}

impl MetricDesc {
    pub fn new(name: impl Into<String>, help: impl Into<String>, labels: &[&str]) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
        }
    }
}

/// Join a namespace and a metric name. An empty namespace leaves the name as is.
pub fn fq_name(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}_{name}")
    }
}

/// One-way, ordered output for descriptors and samples.
pub trait MetricSink: Send {
    /// Announce a family's shape without any value.
    fn describe(&mut self, desc: &MetricDesc);

    /// Publish one gauge sample. `label_values` line up with `desc.labels`.
    fn gauge(&mut self, desc: &MetricDesc, label_values: &[String], value: f64);
}

/// Collects descriptors only; samples are dropped.
impl MetricSink for Vec<MetricDesc> {
    fn describe(&mut self, desc: &MetricDesc) {
        self.push(desc.clone());
    }

    fn gauge(&mut self, _desc: &MetricDesc, _label_values: &[String], _value: f64) {}
}

#[derive(Debug)]
struct Family {
    desc: MetricDesc,
    samples: Vec<(Vec<String>, f64)>,
}

/// Sink that buffers a whole scrape and renders it as text.
#[derive(Debug, Default)]
pub struct Exposition {
    families: Vec<Family>,
    index: HashMap<String, usize>,
}

impl Exposition {
    pub fn new() -> Self {
        Self::default()
    }

    fn family_mut(&mut self, desc: &MetricDesc) -> &mut Family {
        let idx = match self.index.get(&desc.name) {
            Some(&idx) => idx,
            None => {
                self.families.push(Family {
                    desc: desc.clone(),
                    samples: Vec::new(),
                });
                let idx = self.families.len() - 1;
                self.index.insert(desc.name.clone(), idx);
                idx
            }
        };
        &mut self.families[idx]
    }

    /// Names of all families seen so far, in first-seen order.
    pub fn family_names(&self) -> Vec<&str> {
        self.families.iter().map(|f| f.desc.name.as_str()).collect()
    }

    /// Number of samples recorded for a family.
    pub fn series_count(&self, name: &str) -> usize {
        self.index
            .get(name)
            .map(|&idx| self.families[idx].samples.len())
            .unwrap_or(0)
    }

    /// Value of the sample with exactly these label values.
    pub fn value(&self, name: &str, label_values: &[&str]) -> Option<f64> {
        let family = &self.families[*self.index.get(name)?];
        family
            .samples
            .iter()
            .find(|(labels, _)| labels.iter().map(String::as_str).eq(label_values.iter().copied()))
            .map(|(_, v)| *v)
    }

    /// Render every family as HELP/TYPE headers followed by its samples.
    pub fn render(&self) -> String {
        let mut out = String::new();

        for family in &self.families {
            let desc = &family.desc;
            out.push_str(&format!("# HELP {} {}\n", desc.name, escape_help(&desc.help)));
            out.push_str(&format!("# TYPE {} gauge\n", desc.name));

            for (values, value) in &family.samples {
                if desc.labels.is_empty() {
                    out.push_str(&format!("{} {}\n", desc.name, format_value(*value)));
                    continue;
                }
                let labels: Vec<String> = desc
                    .labels
                    .iter()
                    .zip(values)
                    .map(|(name, value)| format!("{name}=\"{}\"", escape_label_value(value)))
                    .collect();
                out.push_str(&format!(
                    "{}{{{}}} {}\n",
                    desc.name,
                    labels.join(","),
                    format_value(*value)
                ));
            }
        }

        out
    }
}

impl MetricSink for Exposition {
    fn describe(&mut self, desc: &MetricDesc) {
        self.family_mut(desc);
    }

    fn gauge(&mut self, desc: &MetricDesc, label_values: &[String], value: f64) {
        self.family_mut(desc)
            .samples
            .push((label_values.to_vec(), value));
    }
}

fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v == f64::INFINITY {
        "+Inf".to_string()
    } else if v == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        format!("{v}")
    }
}

fn escape_help(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\n', "\\n")
}

fn escape_label_value(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channels_desc() -> MetricDesc {
        MetricDesc::new(
            "rabbitmq_connection_channels",
            "number of channels in use",
            &["vhost", "node"],
        )
    }

    fn labels(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn fq_name_joins_namespace() {
        assert_eq!(fq_name("rabbitmq", "up"), "rabbitmq_up");
        assert_eq!(fq_name("", "up"), "up");
    }

    #[test]
    fn render_empty() {
        let mut exposition = Exposition::new();
        exposition.describe(&channels_desc());
        let output = exposition.render();
        assert!(output.contains("# HELP rabbitmq_connection_channels number of channels in use"));
        assert!(output.contains("# TYPE rabbitmq_connection_channels gauge"));
        assert_eq!(exposition.series_count("rabbitmq_connection_channels"), 0);
    }

    #[test]
    fn render_labeled_samples() {
        let desc = channels_desc();
        let mut exposition = Exposition::new();
        exposition.gauge(&desc, &labels(&["/", "rabbit@n1"]), 3.0);
        exposition.gauge(&desc, &labels(&["prod", "rabbit@n2"]), 0.5);

        let output = exposition.render();
        assert!(output.contains("rabbitmq_connection_channels{vhost=\"/\",node=\"rabbit@n1\"} 3\n"));
        assert!(output.contains("rabbitmq_connection_channels{vhost=\"prod\",node=\"rabbit@n2\"} 0.5\n"));
        assert_eq!(output.matches("# TYPE").count(), 1);
    }

    #[test]
    fn render_unlabeled_sample() {
        let desc = MetricDesc::new("rabbitmq_up", "Was the last scrape of rabbitmq successful.", &[]);
        let mut exposition = Exposition::new();
        exposition.gauge(&desc, &[], 1.0);
        assert!(exposition.render().contains("\nrabbitmq_up 1\n"));
    }

    #[test]
    fn label_values_are_escaped() {
        let desc = MetricDesc::new("m", "help", &["peer_host"]);
        let mut exposition = Exposition::new();
        exposition.gauge(&desc, &labels(&["a\"b\\c\nd"]), 1.0);
        assert!(exposition.render().contains(r#"m{peer_host="a\"b\\c\nd"} 1"#));
    }

    #[test]
    fn special_values() {
        assert_eq!(format_value(f64::NAN), "NaN");
        assert_eq!(format_value(f64::INFINITY), "+Inf");
        assert_eq!(format_value(f64::NEG_INFINITY), "-Inf");
        assert_eq!(format_value(150.0), "150");
    }

    #[test]
    fn value_lookup_matches_exact_tuple() {
        let desc = channels_desc();
        let mut exposition = Exposition::new();
        exposition.gauge(&desc, &labels(&["/", "n1"]), 7.0);

        assert_eq!(exposition.value("rabbitmq_connection_channels", &["/", "n1"]), Some(7.0));
        assert_eq!(exposition.value("rabbitmq_connection_channels", &["/", "n2"]), None);
        assert_eq!(exposition.value("missing", &[]), None);
    }

    #[test]
    fn families_keep_first_seen_order() {
        let mut exposition = Exposition::new();
        exposition.describe(&MetricDesc::new("b", "", &[]));
        exposition.describe(&MetricDesc::new("a", "", &[]));
        exposition.describe(&MetricDesc::new("b", "", &[]));
        assert_eq!(exposition.family_names(), vec!["b", "a"]);
    }

    #[test]
    fn descriptor_vec_ignores_samples() {
        let desc = channels_desc();
        let mut descs: Vec<MetricDesc> = Vec::new();
        descs.describe(&desc);
        descs.gauge(&desc, &labels(&["/", "n1"]), 1.0);
        assert_eq!(descs, vec![desc]);
    }

    #[test]
    fn help_text_is_escaped() {
        let desc = MetricDesc::new("m", "line one\nline two \\ end", &[]);
        let mut exposition = Exposition::new();
        exposition.describe(&desc);
        assert!(exposition.render().starts_with("# HELP m line one\\nline two \\\\ end\n"));
    }
}
