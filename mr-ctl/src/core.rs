use common::rpc::{CoordinatorClient, StatusReply, StatusRequest, TaskRow, WireTaskKind};

pub async fn fetch_status(address: String) -> Result<StatusReply, Box<dyn std::error::Error>> {
    let mut client = CoordinatorClient::connect(address).await?;
    let request = tonic::Request::new(StatusRequest {});
    let response = client.status(request).await?;
    Ok(response.into_inner())
}

fn kind_name(row: &TaskRow) -> &'static str {
    match WireTaskKind::try_from(row.kind) {
        Ok(WireTaskKind::Map) => "map",
        Ok(WireTaskKind::Reduce) => "reduce",
        Err(_) => "?",
    }
}

fn summary(reply: &StatusReply, kind: WireTaskKind) -> String {
    let rows: Vec<_> = reply.tasks.iter().filter(|t| t.kind == kind as i32).collect();
    let done = rows.iter().filter(|t| t.status == "completed").count();
    let running = rows.iter().filter(|t| t.status == "in-progress").count();
    format!("{}/{} done, {} running", done, rows.len(), running)
}

fn render_task(row: &TaskRow) -> String {
    let mut line = format!("{:<7} {:>4}  {:<12}", kind_name(row), row.id, row.status);
    if !row.worker.is_empty() {
        line.push(' ');
        line.push_str(&row.worker);
    }
    if row.status == "in-progress" {
        line.push_str(&format!(" ({} ms)", row.running_ms));
    }
    if row.attempts > 1 || row.failures > 0 {
        line.push_str(&format!(" attempts={} failures={}", row.attempts, row.failures));
    }
    line
}

/// Render a status reply for humans.
pub fn render(reply: &StatusReply, pending_only: bool) -> String {
    let mut lines = vec![
        "[Status]".to_string(),
        format!("phase:   {}", reply.phase),
        format!("map:     {}", summary(reply, WireTaskKind::Map)),
        format!("reduce:  {}", summary(reply, WireTaskKind::Reduce)),
    ];
    if !reply.error.is_empty() {
        lines.push(format!("error:   {}", reply.error));
    }

    lines.push("\n[Tasks]".to_string());
    lines.extend(
        reply
            .tasks
            .iter()
            .filter(|row| !(pending_only && row.status == "completed"))
            .map(render_task),
    );

    if !pending_only {
        lines.push("\n[Workers]".to_string());
        lines.extend(reply.workers.iter().map(|w| {
            format!(
                "{:<16} {:<9} {:>4} task(s), seen {} ms ago",
                w.worker_id, w.state, w.tasks_completed, w.last_seen_ms
            )
        }));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}
