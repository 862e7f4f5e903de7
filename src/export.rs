//! Renders a finalized `Snapshot` into one of the four output formats the
//! command line surface supports.

use std::fmt::Write as _;

use serde::Serialize;

use crate::snapshot::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Dot,
    Gml,
    GraphMl,
    Json,
}

impl std::str::FromStr for ExportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dot" => Ok(ExportFormat::Dot),
            "gml" => Ok(ExportFormat::Gml),
            "graphml" => Ok(ExportFormat::GraphMl),
            "json" => Ok(ExportFormat::Json),
            other => Err(anyhow::anyhow!("unknown export format '{}'", other)),
        }
    }
}

pub fn render(snapshot: &Snapshot, format: ExportFormat) -> String {
    match format {
        ExportFormat::Dot => render_dot(snapshot),
        ExportFormat::Gml => render_gml(snapshot),
        ExportFormat::GraphMl => render_graphml(snapshot),
        ExportFormat::Json => render_json(snapshot),
    }
}

fn dot_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn render_dot(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    out.push_str("strict digraph \"\" {\n");
    for node in snapshot.nodes.values() {
        let _ = writeln!(
            out,
            "\"{id}\" [alias=\"{alias}\", timestamp={ts}, in_degree={indeg}, out_degree={outdeg}];",
            id = dot_escape(&node.id),
            alias = dot_escape(&node.alias),
            ts = node.timestamp,
            indeg = node.in_degree,
            outdeg = node.out_degree,
        );
    }
    for (scid, chan) in &snapshot.channels {
        let _ = writeln!(
            out,
            "\"{src}\" -> \"{dst}\" [scid=\"{scid}\", timestamp={ts}, fee_base_msat={fb}, fee_proportional_millionths={fp}];",
            src = dot_escape(&chan.source),
            dst = dot_escape(&chan.destination),
            scid = dot_escape(scid),
            ts = chan.timestamp,
            fb = chan.fee_base_msat.map(|v| v.to_string()).unwrap_or_default(),
            fp = chan
                .fee_proportional_millionths
                .map(|v| v.to_string())
                .unwrap_or_default(),
        );
    }
    out.push_str("}\n");
    out
}

fn render_gml(snapshot: &Snapshot) -> String {
    let mut ids: Vec<&String> = snapshot.nodes.keys().collect();
    ids.sort();
    let index: std::collections::HashMap<&String, usize> =
        ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

    let mut out = String::new();
    out.push_str("graph [\n  directed 1\n");
    for id in &ids {
        let node = &snapshot.nodes[*id];
        let _ = writeln!(out, "  node [\n    id {}\n    label \"{}\"", index[id], id);
        let _ = writeln!(out, "    alias \"{}\"", node.alias.replace('"', "'"));
        let _ = writeln!(out, "    timestamp {}\n  ]", node.timestamp);
    }
    for chan in snapshot.channels.values() {
        let src = index.get(&chan.source);
        let dst = index.get(&chan.destination);
        if let (Some(src), Some(dst)) = (src, dst) {
            let _ = writeln!(out, "  edge [\n    source {}\n    target {}", src, dst);
            let _ = writeln!(out, "    timestamp {}\n  ]", chan.timestamp);
        }
    }
    out.push_str("]\n");
    out
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn render_graphml(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    out.push_str("<?xml version='1.0' encoding='utf-8'?>\n");
    out.push_str("<graphml xmlns=\"http://graphml.graphdrawing.org/xmlns\">\n");
    out.push_str("  <key id=\"alias\" for=\"node\" attr.name=\"alias\" attr.type=\"string\" />\n");
    out.push_str("  <key id=\"timestamp\" for=\"node\" attr.name=\"timestamp\" attr.type=\"long\" />\n");
    out.push_str("  <key id=\"scid\" for=\"edge\" attr.name=\"scid\" attr.type=\"string\" />\n");
    out.push_str("  <key id=\"fee_base_msat\" for=\"edge\" attr.name=\"fee_base_msat\" attr.type=\"long\" />\n");
    out.push_str("  <graph id=\"G\" edgedefault=\"directed\">\n");
    for node in snapshot.nodes.values() {
        let _ = writeln!(out, "    <node id=\"{}\">", xml_escape(&node.id));
        let _ = writeln!(
            out,
            "      <data key=\"alias\">{}</data>",
            xml_escape(&node.alias)
        );
        let _ = writeln!(out, "      <data key=\"timestamp\">{}</data>", node.timestamp);
        out.push_str("    </node>\n");
    }
    for (scid, chan) in &snapshot.channels {
        let _ = writeln!(
            out,
            "    <edge source=\"{}\" target=\"{}\">",
            xml_escape(&chan.source),
            xml_escape(&chan.destination)
        );
        let _ = writeln!(out, "      <data key=\"scid\">{}</data>", xml_escape(scid));
        if let Some(fee) = chan.fee_base_msat {
            let _ = writeln!(out, "      <data key=\"fee_base_msat\">{}</data>", fee);
        }
        out.push_str("    </edge>\n");
    }
    out.push_str("  </graph>\n</graphml>\n");
    out
}

#[derive(Serialize)]
struct AdjacencyEdge<'a> {
    scid: &'a str,
    #[serde(flatten)]
    state: &'a crate::snapshot::ChannelState,
}

#[derive(Serialize)]
struct AdjacencyGraph<'a> {
    directed: bool,
    nodes: Vec<&'a crate::snapshot::NodeState>,
    edges: Vec<AdjacencyEdge<'a>>,
}

fn render_json(snapshot: &Snapshot) -> String {
    let graph = AdjacencyGraph {
        directed: true,
        nodes: snapshot.nodes.values().collect(),
        edges: snapshot
            .channels
            .iter()
            .map(|(scid, chan)| AdjacencyEdge { scid, state: chan })
            .collect(),
    };
    serde_json::to_string(&graph).expect("serializing an adjacency graph never fails")
}
