//! Renders the read-only HTML status page (§4.9): local address, uptime,
//! predecessor, successor, local KV count, self_id and the finger table.
//! A single formatted `String`, matching the original's single-file
//! template rather than pulling in a templating engine.

use crate::node::Node;
use std::fmt::Write as _;

pub fn render(node: &Node) -> String {
    let snapshot = node.state_snapshot();
    let count = node.store().count();
    let uptime = node.uptime().as_secs();

    let mut fingers = String::new();
    for (i, finger) in snapshot.fingers.iter().enumerate() {
        let _ = writeln!(
            fingers,
            "<tr><td>{}</td><td>{}</td></tr>",
            i,
            finger.as_deref().unwrap_or("-")
        );
    }

    format!(
        "<html><head><title>chordnode: {addr}</title></head><body>\
<h1>{addr}</h1>\
<p>self_id: {self_id}</p>\
<p>uptime: {uptime}s</p>\
<p>predecessor: {predecessor}</p>\
<p>successor: {successor}</p>\
<p>local keys: {count}</p>\
<table><tr><th>finger</th><th>address</th></tr>{fingers}</table>\
</body></html>",
        addr = node.self_addr(),
        self_id = node.self_id(),
        uptime = uptime,
        predecessor = snapshot.predecessor.as_deref().unwrap_or("-"),
        successor = snapshot.successor.as_deref().unwrap_or("-"),
        count = count,
        fingers = fingers,
    )
}
