use anyhow::Result;

use crate::config::RunPlan;
use crate::record::Task;

/// Every (category, year) pair of the plan, category-major.
pub fn enumerate(plan: &RunPlan) -> Result<Vec<Task>> {
    plan.check()?;
    Ok(plan
        .categories
        .iter()
        .flat_map(|category| {
            (plan.start_year..=plan.end_year).map(move |year| Task::new(category.clone(), year))
        })
        .collect())
}

/// Deals tasks out to `workers` queues the way cards are dealt: task `i`
/// goes to worker `i % workers`. Assignment is fixed for the whole run.
pub fn assign_round_robin(tasks: Vec<Task>, workers: usize) -> Vec<Vec<Task>> {
    let workers = workers.max(1);
    let mut queues: Vec<Vec<Task>> = (0..workers)
        .map(|_| Vec::with_capacity(tasks.len() / workers + 1))
        .collect();
    for (i, task) in tasks.into_iter().enumerate() {
        queues[i % workers].push(task);
    }
    queues
}
