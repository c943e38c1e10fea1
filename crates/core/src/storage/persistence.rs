//! Graph persistence using bincode serialization.
//!
//! Only the graph structure is written: the parameters and every node's layer
//! and per-layer neighbor ids, in node-id order. Item payloads are not stored;
//! loading requires the caller to hand back the same items in the same order.
//!
//! Layout: `[u64 payload length, BE][bincode payload][magic "SWG1"][u32 CRC32
//! of payload, BE]`. The length prefix lets a reader stop at the end of the
//! snapshot, so it can sit in the middle of a larger stream. File writes go to
//! a temp file first and are renamed into place.

use crate::config::GRAPH_SNAPSHOT_MAGIC;
use crate::hnsw::graph::{Graph, Parameters};
use crate::hnsw::node::Node;
use crate::{Result, SmallWorldError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Header length: payload length as u64.
const HEADER_LEN: usize = 8;

/// Footer length: magic + CRC32.
const FOOTER_LEN: usize = 8;

#[derive(Serialize)]
struct SnapshotRef<'a> {
    parameters: &'a Parameters,
    nodes: &'a [Node],
}

#[derive(Deserialize)]
struct Snapshot {
    parameters: Parameters,
    nodes: Vec<Node>,
}

/// Encode `graph` into `writer`.
pub fn write_graph<T, F, W>(graph: &Graph<T, F>, mut writer: W) -> Result<()>
where
    F: Fn(&T, &T) -> f32,
    W: Write,
{
    let snapshot = SnapshotRef {
        parameters: graph.parameters(),
        nodes: graph.nodes(),
    };
    let bytes = bincode::serialize(&snapshot).map_err(|e| SmallWorldError::Encode(e.to_string()))?;
    let crc = crc32fast::hash(&bytes);

    writer.write_all(&(bytes.len() as u64).to_be_bytes())?;
    writer.write_all(&bytes)?;
    writer.write_all(GRAPH_SNAPSHOT_MAGIC)?;
    writer.write_all(&crc.to_be_bytes())?;
    writer.flush()?;

    tracing::debug!(
        "Encoded graph ({} nodes, {} bytes, CRC32={:#010x})",
        graph.len(),
        bytes.len(),
        crc
    );
    Ok(())
}

/// Fill `buf` from `reader`, reporting a short read as a truncated snapshot.
fn read_section<R: Read>(reader: &mut R, buf: &mut [u8], section: &str) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => {
            SmallWorldError::Decode(format!("snapshot truncated in {section}"))
        }
        _ => SmallWorldError::Io(e),
    })
}

/// Decode a graph from `reader`, attaching `items` and `distance`.
///
/// Consumes exactly one snapshot; anything the reader holds after it is left
/// unread. Fails without building anything if the checksum does not match,
/// the payload is malformed, or the node list is inconsistent with `items`.
pub fn read_graph<T, F, R>(mut reader: R, items: Vec<T>, distance: F) -> Result<Graph<T, F>>
where
    F: Fn(&T, &T) -> f32,
    R: Read,
{
    let mut header = [0u8; HEADER_LEN];
    read_section(&mut reader, &mut header, "header")?;
    let payload_len = u64::from_be_bytes(header);

    // Bounded by what the reader actually holds, not by the claimed length
    let mut payload = Vec::new();
    (&mut reader).take(payload_len).read_to_end(&mut payload)?;
    if payload.len() as u64 != payload_len {
        return Err(SmallWorldError::Decode(format!(
            "snapshot truncated in payload ({} of {} bytes)",
            payload.len(),
            payload_len
        )));
    }

    let mut footer = [0u8; FOOTER_LEN];
    read_section(&mut reader, &mut footer, "footer")?;
    if &footer[..4] != GRAPH_SNAPSHOT_MAGIC {
        return Err(SmallWorldError::Decode(
            "missing snapshot magic, not a smallworld graph".into(),
        ));
    }
    let stored_crc = u32::from_be_bytes([footer[4], footer[5], footer[6], footer[7]]);
    let computed_crc = crc32fast::hash(&payload);
    if stored_crc != computed_crc {
        return Err(SmallWorldError::ChecksumMismatch {
            expected: stored_crc,
            actual: computed_crc,
        });
    }

    let snapshot: Snapshot =
        bincode::deserialize(&payload).map_err(|e| SmallWorldError::Decode(e.to_string()))?;
    validate_snapshot(&snapshot.parameters, &snapshot.nodes, items.len())
        .map_err(SmallWorldError::Decode)?;

    tracing::debug!(
        "Decoded graph ({} nodes, CRC32={:#010x})",
        snapshot.nodes.len(),
        stored_crc
    );
    Ok(Graph::from_parts(
        distance,
        snapshot.parameters,
        items,
        snapshot.nodes,
    ))
}

/// Check structural invariants of a decoded node list.
///
/// Every node must have `layer + 1` adjacency lists within the degree bounds,
/// and every neighbor must be another in-range node present on that layer.
pub fn validate_snapshot(
    params: &Parameters,
    nodes: &[Node],
    item_count: usize,
) -> std::result::Result<(), String> {
    params
        .validate()
        .map_err(|e| format!("persisted parameters rejected: {e}"))?;

    if nodes.len() != item_count {
        return Err(format!(
            "graph holds {} nodes but {} items were supplied",
            nodes.len(),
            item_count
        ));
    }
    if nodes.len() > u32::MAX as usize {
        return Err(format!("node count {} exceeds u32 ids", nodes.len()));
    }

    for (id, node) in nodes.iter().enumerate() {
        if node.neighbors.len() != node.layer + 1 {
            return Err(format!(
                "node {} has layer {} but {} adjacency lists",
                id,
                node.layer,
                node.neighbors.len()
            ));
        }
        for (layer, list) in node.neighbors.iter().enumerate() {
            let bound = params.max_neighbours(layer);
            if list.len() > bound {
                return Err(format!(
                    "node {} has {} neighbors at layer {} (bound {})",
                    id,
                    list.len(),
                    layer,
                    bound
                ));
            }
            for &n in list {
                let Some(neighbor) = nodes.get(n as usize) else {
                    return Err(format!("node {id} links to missing node {n}"));
                };
                if n as usize == id {
                    return Err(format!("node {id} links to itself at layer {layer}"));
                }
                if neighbor.layer < layer {
                    return Err(format!(
                        "node {} links to node {} at layer {} above its top layer {}",
                        id, n, layer, neighbor.layer
                    ));
                }
            }
        }
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// Save `graph` to `path` with an atomic temp-file + rename.
pub fn save_graph<T, F>(graph: &Graph<T, F>, path: &Path) -> Result<()>
where
    F: Fn(&T, &T) -> f32,
{
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let tmp_path = temp_path(path);

    let mut buf = Vec::new();
    write_graph(graph, &mut buf)?;
    fs::write(&tmp_path, &buf)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600))?;
    }
    fs::rename(&tmp_path, path)?;

    tracing::info!(
        "Saved graph to {:?} ({} nodes, {} bytes)",
        path,
        graph.len(),
        buf.len()
    );
    Ok(())
}

/// Load a graph saved by [`save_graph`], re-attaching `items` and `distance`.
pub fn load_graph<T, F>(path: &Path, items: Vec<T>, distance: F) -> Result<Graph<T, F>>
where
    F: Fn(&T, &T) -> f32,
{
    let file = fs::File::open(path)?;
    let graph = read_graph(std::io::BufReader::new(file), items, distance).map_err(|e| {
        tracing::warn!("Rejected graph snapshot {:?}: {}", path, e);
        e
    })?;
    tracing::info!("Loaded graph from {:?} ({} nodes)", path, graph.len());
    Ok(graph)
}
