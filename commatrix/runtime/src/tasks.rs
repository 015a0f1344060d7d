use anyhow::Result;
use tokio::task::JoinHandle;

/// Waits for every per-node task and reports the first failure.
///
/// Later failures are discarded; tasks still in flight when one fails run to
/// completion (they are joined, never interrupted).
pub(crate) async fn wait_all(tasks: Vec<(String, JoinHandle<Result<()>>)>, what: &str) -> Result<()> {
    let mut first_error = None;

    for (node, task) in tasks {
        let failure = match task.await {
            Ok(Ok(())) => None,
            Ok(Err(error)) => Some(error.context(format!("{what} failed on node {node}"))),
            Err(error) => {
                Some(anyhow::Error::from(error).context(format!("{what} task for node {node} panicked")))
            }
        };
        if first_error.is_none() {
            first_error = failure;
        }
    }

    match first_error {
        Some(error) => Err(error),
        None => Ok(()),
    }
}
