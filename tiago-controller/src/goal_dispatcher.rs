use crate::action_client::{ActionError, TrajectoryActionClient};
use crate::keys::ControllerGroup;
use crate::trajectory::{FollowJointTrajectoryGoal, GoalId, TrajectoryResult};
use std::{collections::HashMap, fmt, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("no action client for {0} controller")]
    NoClient(ControllerGroup),
    #[error("goal queue for {0} controller is closed")]
    QueueClosed(ControllerGroup),
}

#[derive(Debug, Clone, PartialEq)]
pub enum GoalEvent {
    Accepted {
        group: ControllerGroup,
        goal_id: GoalId,
    },
    Rejected {
        group: ControllerGroup,
        goal_id: GoalId,
    },
    Finished {
        group: ControllerGroup,
        goal_id: GoalId,
        result: TrajectoryResult,
    },
    Failed {
        group: ControllerGroup,
        message: String,
    },
}

impl fmt::Display for GoalEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoalEvent::Accepted { .. } => write!(f, "Goal accepted"),
            GoalEvent::Rejected { .. } => write!(f, "Goal rejected"),
            GoalEvent::Finished { result, .. } => write!(f, "Result: {}", result.error_code),
            GoalEvent::Failed { group, message } => write!(f, "{} goal failed: {}", group, message),
        }
    }
}

type Outstanding = Arc<Mutex<HashMap<GoalId, ControllerGroup>>>;
type Clients = HashMap<ControllerGroup, Arc<dyn TrajectoryActionClient>>;

/// Sends goals to the action servers without blocking the caller.
///
/// Each controller has a worker draining its own queue so goals reach
/// a server in the order they were dispatched.
pub struct GoalDispatcher {
    clients: Clients,
    queues: HashMap<ControllerGroup, mpsc::UnboundedSender<FollowJointTrajectoryGoal>>,
    outstanding: Outstanding,
    _workers: Vec<JoinHandle<()>>,
}

impl GoalDispatcher {
    pub fn new(
        clients: Clients,
        server_timeout: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<GoalEvent>) {
        let (event_sender, event_receiver) = mpsc::unbounded_channel();
        let outstanding: Outstanding = Arc::new(Mutex::new(HashMap::new()));
        let mut queues = HashMap::new();
        let mut workers = vec![];
        for (group, client) in &clients {
            let (sender, receiver) = mpsc::unbounded_channel();
            queues.insert(*group, sender);
            workers.push(tokio::spawn(run_worker(
                *group,
                Arc::clone(client),
                receiver,
                event_sender.clone(),
                Arc::clone(&outstanding),
                server_timeout,
            )));
        }
        let dispatcher = GoalDispatcher {
            clients,
            queues,
            outstanding,
            _workers: workers,
        };
        (dispatcher, event_receiver)
    }

    pub fn dispatch(
        &self,
        group: ControllerGroup,
        goal: FollowJointTrajectoryGoal,
    ) -> Result<(), DispatchError> {
        self.queues
            .get(&group)
            .ok_or(DispatchError::NoClient(group))?
            .send(goal)
            .map_err(|_| DispatchError::QueueClosed(group))
    }

    pub async fn outstanding_goals(&self) -> usize {
        self.outstanding.lock().await.len()
    }

    /// Cancel every accepted goal still running, returns how many were canceled
    pub async fn cancel_all(&self) -> usize {
        let goals: Vec<_> = self
            .outstanding
            .lock()
            .await
            .iter()
            .map(|(goal_id, group)| (*goal_id, *group))
            .collect();
        let mut canceled = 0;
        for (goal_id, group) in goals {
            let client = match self.clients.get(&group) {
                Some(client) => client,
                None => continue,
            };
            match client.cancel_goal(goal_id).await {
                Ok(()) => canceled += 1,
                Err(ActionError::UnknownGoal(_)) => {
                    debug!("goal {} already gone", goal_id)
                }
                Err(error) => warn!("Failed to cancel {} goal {}: {}", group, goal_id, error),
            }
        }
        canceled
    }
}

async fn run_worker(
    group: ControllerGroup,
    client: Arc<dyn TrajectoryActionClient>,
    mut goals: mpsc::UnboundedReceiver<FollowJointTrajectoryGoal>,
    events: mpsc::UnboundedSender<GoalEvent>,
    outstanding: Outstanding,
    server_timeout: Duration,
) {
    while let Some(goal) = goals.recv().await {
        if let Err(error) = client.wait_for_server(Some(server_timeout)).await {
            warn!("{}", error);
            let _ = events.send(GoalEvent::Failed {
                group,
                message: error.to_string(),
            });
            continue;
        }
        let response = match client.send_goal(goal).await {
            Ok(response) => response,
            Err(error) => {
                warn!("Failed to send {} goal: {}", group, error);
                let _ = events.send(GoalEvent::Failed {
                    group,
                    message: error.to_string(),
                });
                continue;
            }
        };
        let goal_id = response.goal_id;
        if !response.accepted {
            warn!("Goal rejected");
            let _ = events.send(GoalEvent::Rejected { group, goal_id });
            continue;
        }
        info!("Goal accepted");
        outstanding.lock().await.insert(goal_id, group);
        let _ = events.send(GoalEvent::Accepted { group, goal_id });
        tokio::spawn(track_result(
            group,
            goal_id,
            Arc::clone(&client),
            events.clone(),
            Arc::clone(&outstanding),
        ));
    }
    debug!("{} goal queue closed", group);
}

async fn track_result(
    group: ControllerGroup,
    goal_id: GoalId,
    client: Arc<dyn TrajectoryActionClient>,
    events: mpsc::UnboundedSender<GoalEvent>,
    outstanding: Outstanding,
) {
    let result = client.get_result(goal_id).await;
    outstanding.lock().await.remove(&goal_id);
    match result {
        Ok(result) => {
            info!("Result: {}", result.error_code);
            let _ = events.send(GoalEvent::Finished {
                group,
                goal_id,
                result,
            });
        }
        Err(error) => {
            warn!("Failed to get result of {} goal {}: {}", group, goal_id, error);
            let _ = events.send(GoalEvent::Failed {
                group,
                message: error.to_string(),
            });
        }
    }
}
