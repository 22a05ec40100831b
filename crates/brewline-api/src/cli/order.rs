//! Client commands: submit, status, cancel, result.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use serde::Serialize;

use brewline_core::client::{ClientError, OrderClient};
use brewline_core::engine::EngineError;
use brewline_infra::remote::HttpEngineClient;
use brewline_types::order::{OrderRequest, OrderResult, OrderStatus, OrderStatusView};

use crate::cli::SubmitArgs;

pub type RemoteClient = OrderClient<HttpEngineClient>;

/// How command output is rendered.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    fn styled(&self) -> bool {
        !self.json && !self.quiet
    }
}

/// Submit an order, optionally query and cancel it, then wait for the result.
pub async fn submit(client: &RemoteClient, args: SubmitArgs, out: Output) -> Result<()> {
    let request = OrderRequest::new(args.order_id, args.drink, args.size);
    let handle = client.submit(&request).await?;

    if out.styled() {
        println!();
        println!(
            "  {} Submitted {} {} as {}",
            style("✓").green().bold(),
            style(request.size).bold(),
            style(request.drink).cyan(),
            style(&handle.instance_key).yellow()
        );
        println!("  {}  {}", style("Run:").bold(), style(handle.run_id).dim());
    }

    if args.query {
        let view = client.query_status(&request.order_id).await?;
        print_status(&view, out)?;
    }

    let canceller = args.cancel_after.map(|delay| {
        let client = client.clone();
        let order_id = request.order_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            client.cancel(&order_id).await
        })
    });

    let result = client.await_result(&request.order_id).await?;

    if let Some(task) = canceller {
        if !task.is_finished() {
            task.abort();
        } else {
            match task.await {
                Ok(Ok(())) => tracing::debug!(order_id = %request.order_id, "cancel delivered"),
                Ok(Err(ClientError::Engine(EngineError::InstanceClosed(_)))) => {
                    tracing::debug!(order_id = %request.order_id, "order closed before cancel")
                }
                Ok(Err(e)) => {
                    tracing::warn!(order_id = %request.order_id, error = %e, "cancel failed")
                }
                Err(e) => tracing::warn!(error = %e, "cancel task failed"),
            }
        }
    }

    print_result(&result, out)
}

pub async fn status(client: &RemoteClient, order_id: &str, out: Output) -> Result<()> {
    let view = client.query_status(order_id).await?;
    print_status(&view, out)
}

pub async fn cancel(client: &RemoteClient, order_id: &str, out: Output) -> Result<()> {
    client.cancel(order_id).await?;

    if out.json {
        #[derive(Serialize)]
        struct Accepted<'a> {
            order_id: &'a str,
            accepted: bool,
        }
        println!(
            "{}",
            serde_json::to_string_pretty(&Accepted {
                order_id,
                accepted: true
            })?
        );
    } else if !out.quiet {
        println!();
        println!(
            "  {} Cancel requested for order {}",
            style("✓").green().bold(),
            style(order_id).yellow()
        );
        println!(
            "  {}",
            style("It takes effect before the next step starts.").dim()
        );
        println!();
    }
    Ok(())
}

pub async fn result(client: &RemoteClient, order_id: &str, out: Output) -> Result<()> {
    let result = client.await_result(order_id).await?;
    print_result(&result, out)
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn print_status(view: &OrderStatusView, out: Output) -> Result<()> {
    if out.styled() {
        println!();
        println!("{}", status_table(view));
        println!();
    } else {
        println!("{}", serde_json::to_string_pretty(view)?);
    }
    Ok(())
}

/// The result is always printed as pretty JSON; styled mode adds a headline.
fn print_result(result: &OrderResult, out: Output) -> Result<()> {
    if out.styled() {
        println!();
        println!("  {}", headline(result));
        println!();
    }
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}

fn headline(result: &OrderResult) -> String {
    let status = match result.status {
        OrderStatus::Completed => style(result.status.to_string()).green().bold(),
        OrderStatus::Cancelled => style(result.status.to_string()).yellow().bold(),
        OrderStatus::Failed => style(result.status.to_string()).red().bold(),
    };
    format!(
        "Order {} {} ({} cents)",
        style(&result.order_id).cyan(),
        status,
        result.amount_cents
    )
}

fn flag_cell(done: bool) -> Cell {
    if done {
        Cell::new("✓ yes").fg(Color::Green)
    } else {
        Cell::new("· no").fg(Color::DarkGrey)
    }
}

fn status_table(view: &OrderStatusView) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Order").fg(Color::White),
        Cell::new("Phase").fg(Color::White),
        Cell::new("Amount").fg(Color::White),
        Cell::new("Charged").fg(Color::White),
        Cell::new("Brewed").fg(Color::White),
        Cell::new("Receipt").fg(Color::White),
        Cell::new("Cancelled").fg(Color::White),
    ]);

    let phase_color = if view.phase.is_terminal() {
        Color::Green
    } else {
        Color::Yellow
    };

    table.add_row(vec![
        Cell::new(&view.order_id).fg(Color::Cyan),
        Cell::new(view.phase.as_str()).fg(phase_color),
        Cell::new(format!("{} cents", view.state.amount_cents)),
        flag_cell(view.state.charged),
        flag_cell(view.state.brewed),
        flag_cell(view.state.receipt_sent),
        flag_cell(view.state.cancelled),
    ]);

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use brewline_types::order::{OrderState, WorkflowPhase};

    #[test]
    fn test_status_table_lists_phase_and_amount() {
        let view = OrderStatusView {
            order_id: "42".to_string(),
            phase: WorkflowPhase::Brewing,
            state: OrderState {
                charged: true,
                amount_cents: 525,
                ..OrderState::default()
            },
        };
        let rendered = status_table(&view).to_string();
        assert!(rendered.contains("BREWING"));
        assert!(rendered.contains("525 cents"));
        assert!(rendered.contains("42"));
    }

    #[test]
    fn test_headline_names_status() {
        let result = OrderResult {
            order_id: "7".to_string(),
            status: OrderStatus::Cancelled,
            charged: true,
            brewed: false,
            receipt_sent: false,
            amount_cents: 300,
        };
        let line = console::strip_ansi_codes(&headline(&result)).to_string();
        assert_eq!(line, "Order 7 CANCELLED (300 cents)");
    }
}
