//! Template rendering for metric lines.
//!
//! Templates use `{name}` placeholders; `{{` and `}}` produce literal braces.
//! Names are resolved against a closed vocabulary:
//!
//! | placeholder | value |
//! |-------------|-------|
//! | `version`   | stats server version |
//! | `node`      | node label |
//! | `role`      | role label |
//! | `req`       | total requests |
//! | `rps`       | requests per second |
//! | `avg`       | mean response time (ms) |
//! | `lq`        | listen queue depth |
//! | `tx`        | total transmitted bytes |
//! | `busy`      | busy workers |
//! | `idle`      | non-busy workers |
//! | `rss`       | mean RSS (bytes) |
//! | `vsz`       | mean VSZ (bytes) |
//! | `workers`   | worker count |
//! | `ts`        | capture time, ns since epoch |

use ahash::AHashMap as HashMap;
use once_cell::sync::Lazy;

use crate::aggregate::MetricSummary;
use crate::error::AgentError;

/// Default output line, InfluxDB line protocol.
pub const DEFAULT_TEMPLATE: &str =
    "uwsgi,node={node},role={role} req={req}i,rps={rps}i,avg={avg}i,lq={lq}i,busy={busy}i,idle={idle}i";

type FieldFn = fn(&MetricSummary) -> String;

static PLACEHOLDERS: Lazy<HashMap<&'static str, FieldFn>> = Lazy::new(|| {
    let table: [(&'static str, FieldFn); 14] = [
        ("version", |s| s.version.clone()),
        ("node", |s| s.node.clone()),
        ("role", |s| s.role.clone()),
        ("req", |s| s.requests.to_string()),
        ("rps", |s| s.rps.to_string()),
        ("avg", |s| s.avg_rt_ms.to_string()),
        ("lq", |s| s.listen_queue.to_string()),
        ("tx", |s| s.tx.to_string()),
        ("busy", |s| s.busy.to_string()),
        ("idle", |s| s.idle.to_string()),
        ("rss", |s| s.avg_rss.to_string()),
        ("vsz", |s| s.avg_vsz.to_string()),
        ("workers", |s| s.workers.to_string()),
        ("ts", |s| s.timestamp_ns.to_string()),
    ];
    table.into_iter().collect()
});

/// Names accepted inside `{...}`.
pub fn placeholder_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = PLACEHOLDERS.keys().copied().collect();
    names.sort_unstable();
    names
}

/// Output line template. Placeholders are checked lazily, at render time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    raw: String,
}

impl Default for Template {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}

impl Template {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Renders `summary` into a single `\n`-terminated line.
    pub fn render(&self, summary: &MetricSummary) -> Result<String, AgentError> {
        let mut out = String::with_capacity(self.raw.len() + 64);
        let mut chars = self.raw.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    out.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    out.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for n in chars.by_ref() {
                        if n == '}' {
                            closed = true;
                            break;
                        }
                        name.push(n);
                    }
                    let field = PLACEHOLDERS
                        .get(name.as_str())
                        .filter(|_| closed)
                        .ok_or(AgentError::UnknownPlaceholder(name))?;
                    out.push_str(&field(summary));
                }
                other => out.push(other),
            }
        }

        out.push('\n');
        Ok(out)
    }
}
