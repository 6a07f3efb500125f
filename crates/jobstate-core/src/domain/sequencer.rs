//! Task sequencing within a job.

use super::ids::TaskName;
use super::state::TaskState;

/// The first task, in configured order, that is not Completed.
/// `None` means every task is done.
pub fn next_task_name<'a, I>(tasks: I) -> Option<&'a TaskName>
where
    I: IntoIterator<Item = (&'a TaskName, TaskState)>,
{
    tasks
        .into_iter()
        .find(|(_, state)| *state != TaskState::Completed)
        .map(|(name, _)| name)
}
