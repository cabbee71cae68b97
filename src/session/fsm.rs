use super::message::NotificationMessage;
use super::SessionState;

/// Everything a session noticed during one tick, gathered before deciding
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Observations {
    /// Idle sessions may start on their own (administratively enabled)
    pub auto_start: bool,
    pub open_delivered: bool,
    pub connected: bool,
    pub transport_lost: bool,
    pub open_received: bool,
    /// Peer OPEN carried an unexpected AS
    pub open_rejected: bool,
    pub keepalive_received: bool,
    pub notification_received: bool,
    pub hold_expired: bool,
    pub keepalive_due: bool,
}

/// Side effects requested by a transition, applied in order by the session
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    ReleaseResources,
    AcquireResources,
    SendOpen,
    SendKeepalive,
    SendNotification(NotificationMessage),
    LoadTimers,
    ReloadKeepalive,
    AdvertiseRoutes,
    StopRouteExchange,
    DrainQueue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: SessionState,
    pub to: SessionState,
    pub actions: Vec<Action>,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }

    fn stay(state: SessionState, actions: Vec<Action>) -> Self {
        Self {
            from: state,
            to: state,
            actions,
        }
    }

    /// Run `actions` before the exit/enter pair
    fn preceded_by(mut self, mut actions: Vec<Action>) -> Self {
        actions.append(&mut self.actions);
        self.actions = actions;
        self
    }
}

fn exit_actions(state: SessionState) -> Vec<Action> {
    match state {
        SessionState::Established => vec![Action::StopRouteExchange],
        _ => vec![],
    }
}

fn enter_actions(state: SessionState) -> Vec<Action> {
    use Action::*;
    match state {
        SessionState::Idle => vec![ReleaseResources],
        SessionState::Connect => vec![AcquireResources, SendOpen, DrainQueue],
        SessionState::OpenConfirm => vec![SendKeepalive, DrainQueue],
        SessionState::Established => vec![LoadTimers],
        SessionState::OpenSent | SessionState::Active => vec![],
    }
}

/// The exit actions of `from` followed by the entry actions of `to`
///
/// This is the only way a session changes state; moving to the current
/// state is a no-op.
pub fn change(from: SessionState, to: SessionState) -> Transition {
    if from == to {
        return Transition::stay(from, vec![]);
    }
    let mut actions = exit_actions(from);
    actions.extend(enter_actions(to));
    Transition { from, to, actions }
}

/// Decide the next state for one tick
pub fn step(state: SessionState, obs: &Observations) -> Transition {
    use SessionState::*;
    match state {
        Idle if obs.auto_start => change(Idle, Connect),
        Idle => Transition::stay(Idle, vec![]),
        Connect if obs.open_delivered && obs.connected => change(Connect, OpenSent),
        Connect => change(Connect, Idle),
        OpenSent | OpenConfirm if obs.notification_received || obs.transport_lost => {
            change(state, Idle)
        }
        OpenSent if obs.open_rejected => change(OpenSent, Idle).preceded_by(vec![
            Action::SendNotification(NotificationMessage::bad_peer_as()),
            Action::DrainQueue,
        ]),
        OpenSent if obs.open_received => change(OpenSent, OpenConfirm),
        OpenConfirm if obs.keepalive_received => change(OpenConfirm, Established),
        OpenSent | OpenConfirm => Transition::stay(state, vec![]),
        Established if obs.hold_expired => change(Established, Idle).preceded_by(vec![
            Action::SendNotification(NotificationMessage::hold_timer_expired()),
            Action::DrainQueue,
        ]),
        Established => {
            let mut actions = vec![];
            if obs.keepalive_due {
                actions.push(Action::SendKeepalive);
                actions.push(Action::ReloadKeepalive);
            }
            actions.push(Action::AdvertiseRoutes);
            actions.push(Action::DrainQueue);
            Transition::stay(Established, actions)
        }
        // Reserved, never entered
        Active => change(Active, Idle),
    }
}
