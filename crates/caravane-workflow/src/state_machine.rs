//! 会诊状态机
//!
//! 状态只能前进：awaiting → in_progress → completed

use caravane_core::{CaravaneError, ConsultationStatus, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 会诊状态转换事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationEvent {
    Start,
    Complete,
}

/// 会诊状态机
#[derive(Debug, Clone)]
pub struct ConsultationStateMachine {
    transitions: HashMap<(ConsultationStatus, ConsultationEvent), ConsultationStatus>,
}

impl ConsultationStateMachine {
    pub fn new() -> Self {
        use ConsultationEvent::*;
        use ConsultationStatus::*;

        let mut transitions = HashMap::new();
        transitions.insert((Awaiting, Start), InProgress);
        transitions.insert((Awaiting, Complete), Completed);
        transitions.insert((InProgress, Complete), Completed);

        Self { transitions }
    }

    pub fn can_transition(&self, from: ConsultationStatus, event: ConsultationEvent) -> bool {
        self.transitions.contains_key(&(from, event))
    }

    /// 执行状态转换
    pub fn transition(
        &self,
        from: ConsultationStatus,
        event: ConsultationEvent,
    ) -> Result<ConsultationStatus> {
        match self.transitions.get(&(from, event)) {
            Some(to) => Ok(*to),
            None => Err(CaravaneError::IllegalTransition {
                from,
                to: Self::target_of(event),
            }),
        }
    }

    /// 转诊去向编辑后的状态：未完成的推进到 completed，已完成的保持不变
    pub fn complete(&self, from: ConsultationStatus) -> ConsultationStatus {
        self.transition(from, ConsultationEvent::Complete)
            .unwrap_or(ConsultationStatus::Completed)
    }

    /// 通用更新中直接指定目标状态时的检查
    ///
    /// 相同状态视为无操作；向后退返回 `IllegalTransition`。
    pub fn ensure_forward(&self, from: ConsultationStatus, to: ConsultationStatus) -> Result<()> {
        if to >= from {
            Ok(())
        } else {
            tracing::warn!("Rejected backward status change {} -> {}", from, to);
            Err(CaravaneError::IllegalTransition { from, to })
        }
    }

    /// 获取状态的所有可能事件
    pub fn possible_events(&self, current: ConsultationStatus) -> Vec<ConsultationEvent> {
        self.transitions
            .keys()
            .filter(|(state, _)| *state == current)
            .map(|(_, event)| *event)
            .collect()
    }

    fn target_of(event: ConsultationEvent) -> ConsultationStatus {
        match event {
            ConsultationEvent::Start => ConsultationStatus::InProgress,
            ConsultationEvent::Complete => ConsultationStatus::Completed,
        }
    }
}

impl Default for ConsultationStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConsultationStatus::*;

    #[test]
    fn test_valid_transitions() {
        let sm = ConsultationStateMachine::new();

        assert!(sm.can_transition(Awaiting, ConsultationEvent::Start));
        assert!(sm.can_transition(InProgress, ConsultationEvent::Complete));
        assert_eq!(sm.transition(Awaiting, ConsultationEvent::Complete).unwrap(), Completed);
    }

    #[test]
    fn test_invalid_transitions() {
        let sm = ConsultationStateMachine::new();

        assert!(!sm.can_transition(Completed, ConsultationEvent::Start));
        assert!(!sm.can_transition(InProgress, ConsultationEvent::Start));
        assert!(matches!(
            sm.transition(Completed, ConsultationEvent::Start),
            Err(CaravaneError::IllegalTransition { from: Completed, to: InProgress })
        ));
        assert!(sm.possible_events(Completed).is_empty());
    }

    #[test]
    fn test_complete_is_idempotent() {
        let sm = ConsultationStateMachine::new();
        assert_eq!(sm.complete(Awaiting), Completed);
        assert_eq!(sm.complete(InProgress), Completed);
        assert_eq!(sm.complete(Completed), Completed);
    }

    #[test]
    fn test_ensure_forward() {
        let sm = ConsultationStateMachine::new();
        assert!(sm.ensure_forward(Awaiting, Completed).is_ok());
        assert!(sm.ensure_forward(InProgress, InProgress).is_ok());
        assert!(sm.ensure_forward(Completed, Awaiting).is_err());
        assert!(sm.ensure_forward(InProgress, Awaiting).is_err());
    }
}
