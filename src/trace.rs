use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// JSONL render trace. Cloning shares the sink; a disabled trace drops
/// every event without formatting it. Counters live in the per-render
/// [`TraceScope`], so concurrent renders never mix their summaries.
#[derive(Clone, Default)]
pub struct RenderTrace {
    inner: Option<Arc<Mutex<Box<dyn Write + Send>>>>,
}

impl RenderTrace {
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub fn to_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::to_writer(BufWriter::new(file)))
    }

    pub fn to_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            inner: Some(Arc::new(Mutex::new(Box::new(writer)))),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Opens the event scope of one render. Every line it writes carries
    /// `kind` and `record_id`.
    pub fn scope(&self, kind: &str, record_id: &str) -> TraceScope<'_> {
        TraceScope {
            trace: self,
            tag: format!(
                "\"kind\":\"{}\",\"record_id\":\"{}\"",
                json_escape(kind),
                json_escape(record_id)
            ),
            counters: BTreeMap::new(),
            stage_ms: BTreeMap::new(),
        }
    }

    fn write_line(&self, json: &str) {
        if let Some(inner) = &self.inner {
            if let Ok(mut writer) = inner.lock() {
                let _ = writeln!(writer, "{json}");
            }
        }
    }

    pub fn flush(&self) {
        if let Some(inner) = &self.inner {
            if let Ok(mut writer) = inner.lock() {
                let _ = writer.flush();
            }
        }
    }
}

/// Events and counters of a single render.
pub struct TraceScope<'a> {
    trace: &'a RenderTrace,
    tag: String,
    counters: BTreeMap<String, u64>,
    stage_ms: BTreeMap<String, f64>,
}

impl TraceScope<'_> {
    pub fn is_enabled(&self) -> bool {
        self.trace.is_enabled()
    }

    pub fn increment(&mut self, key: &str, amount: u64) {
        if !self.is_enabled() {
            return;
        }
        let entry = self.counters.entry(key.to_string()).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    fn event(&mut self, kind: &str, body: &str) {
        self.increment(kind, 1);
        self.trace
            .write_line(&format!("{{\"type\":\"{kind}\",{},{body}}}", self.tag));
    }

    pub fn stage(&mut self, stage: &str, ms: f64) {
        if !self.is_enabled() {
            return;
        }
        *self.stage_ms.entry(stage.to_string()).or_insert(0.0) += ms;
        self.trace.write_line(&format!(
            "{{\"type\":\"render.stage\",{},\"stage\":\"{}\",\"ms\":{:.3}}}",
            self.tag,
            json_escape(stage),
            ms
        ));
    }

    pub fn field_skipped(&mut self, key: &str, destination: &str, reason: &str) {
        if !self.is_enabled() {
            return;
        }
        let body = format!(
            "\"key\":\"{}\",\"dest\":\"{}\",\"reason\":\"{}\"",
            json_escape(key),
            json_escape(destination),
            json_escape(reason)
        );
        self.event("field.skipped", &body);
    }

    pub fn field_truncated(&mut self, key: &str, destination: &str) {
        if !self.is_enabled() {
            return;
        }
        let body = format!(
            "\"key\":\"{}\",\"dest\":\"{}\"",
            json_escape(key),
            json_escape(destination)
        );
        self.event("field.truncated", &body);
    }

    pub fn table_page_break(&mut self, page_number: usize, rows: usize) {
        if !self.is_enabled() {
            return;
        }
        let body = format!("\"page\":{page_number},\"rows\":{rows}");
        self.event("table.page_break", &body);
    }

    pub fn signature_failed(&mut self, slot: &str, detail: &str) {
        if !self.is_enabled() {
            return;
        }
        let body = format!(
            "\"slot\":\"{}\",\"detail\":\"{}\"",
            json_escape(slot),
            json_escape(detail)
        );
        self.event("signature.failed", &body);
    }

    /// Writes this render's counters and stage totals as the summary line and
    /// flushes the sink.
    pub fn finish(self) {
        if !self.is_enabled() {
            return;
        }
        let mut counts_json = String::from("{");
        for (idx, (key, value)) in self.counters.iter().enumerate() {
            if idx > 0 {
                counts_json.push(',');
            }
            counts_json.push_str(&format!("\"{}\":{}", json_escape(key), value));
        }
        counts_json.push('}');
        let mut stages_json = String::from("{");
        for (idx, (key, value)) in self.stage_ms.iter().enumerate() {
            if idx > 0 {
                stages_json.push(',');
            }
            stages_json.push_str(&format!("\"{}\":{:.3}", json_escape(key), value));
        }
        stages_json.push('}');
        self.trace.write_line(&format!(
            "{{\"type\":\"render.summary\",{},\"counts\":{},\"stage_ms\":{}}}",
            self.tag, counts_json, stages_json
        ));
        self.trace.flush();
    }
}

pub(crate) fn json_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 8);
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ch if (ch as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", ch as u32)),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[derive(Clone, Default)]
    pub(crate) struct SharedBuf(pub(crate) Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        pub(crate) fn lines(&self) -> Vec<serde_json::Value> {
            let raw = self.0.lock().expect("lock").clone();
            String::from_utf8(raw)
                .expect("utf8")
                .lines()
                .map(|line| serde_json::from_str(line).expect("json line"))
                .collect()
        }
    }

    #[test]
    fn events_are_valid_json_lines() {
        let buf = SharedBuf::default();
        let trace = RenderTrace::to_writer(buf.clone());
        let mut scope = trace.scope("gas_safety_record", "CP12-7");
        scope.stage("resolving_fields", 1.25);
        scope.field_skipped("landlord \"name\"", "landlord_name", "widget_missing");
        scope.field_truncated("notes", "@40,600");
        scope.table_page_break(2, 6);
        scope.signature_failed("engineer", "timed out\nretry");
        scope.finish();

        let lines = buf.lines();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[1]["key"], "landlord \"name\"");
        assert_eq!(lines[4]["detail"], "timed out\nretry");
        assert!(lines.iter().all(|line| line["record_id"] == "CP12-7"));
        assert!(lines.iter().all(|line| line["kind"] == "gas_safety_record"));
        let summary = &lines[5];
        assert_eq!(summary["type"], "render.summary");
        assert_eq!(summary["counts"]["field.skipped"], 1);
        assert_eq!(summary["counts"]["signature.failed"], 1);
        assert_eq!(summary["stage_ms"]["resolving_fields"], 1.25);
    }

    #[test]
    fn scopes_keep_their_own_counters() {
        let buf = SharedBuf::default();
        let trace = RenderTrace::to_writer(buf.clone());
        let mut first = trace.scope("job_sheet", "A");
        let mut second = trace.scope("job_sheet", "B");
        first.increment("x", 3);
        second.table_page_break(2, 1);
        first.stage("finalizing", 2.0);
        second.finish();
        first.finish();
        let lines = buf.lines();
        let summary_of = |id: &str| {
            lines
                .iter()
                .find(|line| line["type"] == "render.summary" && line["record_id"] == id)
                .cloned()
                .expect("summary")
        };
        let a = summary_of("A");
        let b = summary_of("B");
        assert_eq!(a["counts"]["x"], 3);
        assert!(a["counts"].get("table.page_break").is_none());
        assert_eq!(b["counts"]["table.page_break"], 1);
        assert!(b["stage_ms"].as_object().expect("obj").is_empty());
    }

    #[test]
    fn disabled_trace_is_inert() {
        let trace = RenderTrace::disabled();
        assert!(!trace.is_enabled());
        let mut scope = trace.scope("k", "r");
        scope.stage("s", 1.0);
        scope.increment("x", 1);
        scope.finish();
        trace.flush();
    }
}
