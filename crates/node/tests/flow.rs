//! Hand-routed transfer flow between two nodes, without the harness.

use ezchain_core::{
    Action, IdGen, MajorityVerifier, OutboundMessage, ProtocolConfig, ProtocolEvent, StateMachine,
};
use ezchain_node::NodeStateMachine;
use ezchain_store::MemoryStore;
use ezchain_types::{BlockHeight, NodeId};
use std::sync::Arc;
use std::time::Duration;

fn two_nodes() -> (NodeStateMachine, NodeStateMachine) {
    let config = ProtocolConfig::default()
        .with_nodes(2)
        .with_initial_values(3.0)
        .with_use_cc(false);
    let store = Arc::new(MemoryStore::new());
    let value_ids = IdGen::new();
    let tx_ids = IdGen::new();
    let block_ids = IdGen::starting_at(1);
    let verifier = Arc::new(MajorityVerifier);

    let node0 = NodeStateMachine::new(
        NodeId(0),
        config.clone(),
        store.clone(),
        value_ids.clone(),
        tx_ids.clone(),
        block_ids.clone(),
        verifier.clone(),
        11,
    )
    .expect("node 0 init");
    let node1 = NodeStateMachine::new(
        NodeId(1),
        config,
        store,
        value_ids,
        tx_ids,
        block_ids,
        verifier,
        22,
    )
    .expect("node 1 init");
    (node0, node1)
}

fn first_message<'a>(actions: &'a [Action], name: &str) -> &'a OutboundMessage {
    actions
        .iter()
        .find_map(|a| match a {
            Action::Broadcast { message } | Action::Send { message, .. }
                if message.type_name() == name =>
            {
                Some(message)
            }
            _ => None,
        })
        .unwrap_or_else(|| panic!("no {name} message in {actions:?}"))
}

#[test]
fn transfer_and_adopt() {
    let (mut node0, mut node1) = two_nodes();
    let initial_holdings = node0.holdings().len();
    assert!(initial_holdings > 0);

    // Node 0 mints its first transaction at t=0 and seals it immediately.
    node0.set_time(Duration::ZERO);
    let actions = node0.initialize();
    let inf = match first_message(&actions, "Inf") {
        OutboundMessage::Inf(inf) => inf.clone(),
        _ => unreachable!(),
    };
    assert_eq!(inf.owner, NodeId(0));
    assert_eq!(inf.len(), 1);
    let value = inf.entries[0].tx.value;
    // With two nodes the recipient is forced.
    assert_eq!(inf.entries[0].tx.recv, NodeId(1));
    assert_eq!(node0.holdings().len(), initial_holdings - 1);

    // Node 1 verifies and buffers the set, then wins the mining race.
    node1.set_time(Duration::from_secs(5));
    let actions = node1.handle(ProtocolEvent::InfReceived { inf });
    assert!(
        !actions
            .iter()
            .any(|a| matches!(a, Action::RecordError { .. })),
        "peer set should verify: {actions:?}"
    );

    let actions = node1.handle(ProtocolEvent::MiningTimer);
    let block = match first_message(&actions, "AcBlock") {
        OutboundMessage::AcBlock(block) => block.clone(),
        _ => unreachable!(),
    };
    assert_eq!(block.height, BlockHeight(1));
    assert!(block.node_filter.contains(&NodeId(0)));

    let receipt = match first_message(&actions, "Receipt") {
        OutboundMessage::Receipt(receipt) => receipt.clone(),
        _ => unreachable!(),
    };
    assert_eq!(receipt.sender, NodeId(0));
    assert_eq!(receipt.recv, NodeId(1));
    assert_eq!(receipt.height, BlockHeight(1));

    // Node 0 ingests the block and records its sealed set.
    node0.set_time(Duration::from_secs(5));
    let actions = node0.handle(ProtocolEvent::AcBlockReceived {
        block: block.clone(),
    });
    assert!(
        !actions
            .iter()
            .any(|a| matches!(a, Action::RecordError { .. })),
        "block ingest should be clean: {actions:?}"
    );
    assert_eq!(node0.personal_chain().len(), 1);
    assert_eq!(node0.personal_chain()[0].height, BlockHeight(1));

    // Node 1 validates the receipt and adopts the Value.
    let actions = node1.handle(ProtocolEvent::ReceiptReceived { receipt });
    assert!(
        !actions
            .iter()
            .any(|a| matches!(a, Action::RecordError { .. })),
        "receipt should validate: {actions:?}"
    );
    let proof = node1.proof_of(value).expect("value adopted");
    assert_eq!(proof.steps().len(), 1);
    assert_eq!(proof.steps()[0].height, BlockHeight(1));
    assert_eq!(proof.steps()[0].author(), Some(NodeId(0)));
}

#[test]
fn receipt_for_someone_else_rejected() {
    let (mut node0, mut node1) = two_nodes();
    node0.set_time(Duration::ZERO);
    let actions = node0.initialize();
    let inf = match first_message(&actions, "Inf") {
        OutboundMessage::Inf(inf) => inf.clone(),
        _ => unreachable!(),
    };

    node1.set_time(Duration::from_secs(5));
    let _ = node1.handle(ProtocolEvent::InfReceived { inf });
    let actions = node1.handle(ProtocolEvent::MiningTimer);
    let mut receipt = match first_message(&actions, "Receipt") {
        OutboundMessage::Receipt(receipt) => receipt.clone(),
        _ => unreachable!(),
    };

    // Deliver the receipt to the wrong node.
    receipt.recv = NodeId(0);
    node0.set_time(Duration::from_secs(5));
    let block = node1.ac_chain().tip().unwrap().clone();
    let _ = node0.handle(ProtocolEvent::AcBlockReceived { block });
    let actions = node0.handle(ProtocolEvent::ReceiptReceived { receipt });
    assert!(
        actions
            .iter()
            .any(|a| matches!(a, Action::RecordError { .. })),
        "misdirected receipt must be rejected: {actions:?}"
    );
    assert!(node0.holdings().iter().all(|p| p.init_id == NodeId(0)));
}
