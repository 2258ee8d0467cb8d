// Copyright 2025 taskgrid Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Mutex;

use async_trait::async_trait;
use taskgrid_base::{ClusterUuid, SchedulerNode, SchedulerNodeUuid};
use taskgrid_error::Result;
use taskgrid_scheduler::interface::LeaderControl;

/// Leader control for a process-local cluster: registered nodes, first
/// successful election wins and holds.
pub struct LocalLeaderControl {
    cluster: ClusterUuid,
    nodes:   Mutex<Vec<SchedulerNode>>,
    leader:  Mutex<Option<SchedulerNodeUuid>>,
}

impl LocalLeaderControl {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cluster: ClusterUuid::new(),
            nodes:   Mutex::new(Vec::new()),
            leader:  Mutex::new(None),
        }
    }

    pub fn register_node(&self, node: SchedulerNode) {
        self.nodes.lock().expect("node table poisoned").push(node);
    }

    /// Drop leadership, as an etcd lease expiry would.
    pub fn depose(&self) { *self.leader.lock().expect("leader slot poisoned") = None; }
}

impl Default for LocalLeaderControl {
    fn default() -> Self { Self::new() }
}

#[async_trait]
impl LeaderControl for LocalLeaderControl {
    async fn get_leader(&self) -> Result<Option<SchedulerNode>> {
        let leader = *self.leader.lock().expect("leader slot poisoned");
        Ok(leader.and_then(|uuid| {
            self.nodes
                .lock()
                .expect("node table poisoned")
                .iter()
                .find(|node| node.uuid == uuid)
                .cloned()
        }))
    }

    async fn elect_leader(&self, uuid: SchedulerNodeUuid) -> Result<bool> {
        let mut leader = self.leader.lock().expect("leader slot poisoned");
        match *leader {
            None => {
                *leader = Some(uuid);
                Ok(true)
            }
            Some(current) => Ok(current == uuid),
        }
    }

    async fn is_he_leader(&self, uuid: SchedulerNodeUuid) -> Result<bool> {
        Ok(*self.leader.lock().expect("leader slot poisoned") == Some(uuid))
    }

    async fn get_all_nodes(&self) -> Result<Vec<SchedulerNode>> {
        Ok(self.nodes.lock().expect("node table poisoned").clone())
    }

    async fn get_cluster_id(&self) -> Result<ClusterUuid> { Ok(self.cluster) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> SchedulerNode {
        SchedulerNode {
            uuid: SchedulerNodeUuid::new(),
            ip:   "127.0.0.1".to_string(),
            port: 7000,
        }
    }

    #[tokio::test]
    async fn first_election_wins_until_deposed() {
        let control = LocalLeaderControl::new();
        let a = node();
        let b = node();
        control.register_node(a.clone());
        control.register_node(b.clone());

        assert!(control.get_leader().await.unwrap().is_none());
        assert!(control.elect_leader(a.uuid).await.unwrap());
        assert!(!control.elect_leader(b.uuid).await.unwrap());
        assert_eq!(control.get_leader().await.unwrap().unwrap().uuid, a.uuid);
        assert!(control.is_he_leader(a.uuid).await.unwrap());

        control.depose();
        assert!(control.elect_leader(b.uuid).await.unwrap());
        assert_eq!(control.get_leader().await.unwrap().unwrap().uuid, b.uuid);
    }
}
