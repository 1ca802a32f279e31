// exam-shelf: 从 stdin 读取一条 JSON 命令，向 stdout 输出 ActionResult JSON。
//
//   echo '{"command":"scan_orphans","examId":"jee-mains"}' | exam-shelf

use std::io::Read;
use std::sync::Arc;

use anyhow::Context;
use exam_shelf_lib::config::ShelfConfig;
use exam_shelf_lib::shelf::{dispatch, ActionResult, ShelfCommand, ShelfDatabase, ShelfError};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = ShelfConfig::load().context("failed to load configuration")?;
    exam_shelf_lib::init_tracing(&cfg.log_filter);

    let db: Arc<ShelfDatabase> = Arc::new(cfg.open_database().context("failed to open database")?);

    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;

    let out = match serde_json::from_str::<ShelfCommand>(&buf) {
        Ok(command) => dispatch(&db, command).await,
        Err(e) => {
            tracing::error!("[Shelf::Cli] Invalid command: {}", e);
            let err = ShelfError::validation(format!("invalid command: {}", e));
            serde_json::to_value(ActionResult::<()>::from_error(&err))?
        }
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
