use buildrules_core::app::RulesClient;
use buildrules_core::domain::{OutputMode, RulesError, TaskQueueName};
use buildrules_core::ports::StoreDialer;

/// `get-build-id-rules`: print both tables (or JSON) of a task queue.
pub async fn run<D: StoreDialer>(
    client: &RulesClient<D>,
    task_queue: &str,
    output: OutputMode,
) -> Result<(), RulesError> {
    let task_queue = TaskQueueName::parse(task_queue)?;
    let rules = client.get_rules(&task_queue).await?;
    tracing::debug!(
        task_queue = %task_queue,
        rule_count = rules.assignment_rules.len() + rules.redirect_rules.len(),
        "fetched rules"
    );
    super::print_rules(&rules, output)
}
