mod common;

use telar_lib::*;
use common::*;

///A packet walks two output-queued routers: the whole packet is buffered at the input,
///crosses the switch at once after the transfer latency, and serializes onto the channel.
#[test]
fn whole_packet_transfer()
{
    let router = create_oq_router(2.0, 8.0, 2.0);
    let routing = create_two_router_routing(2);
    let configuration = create_configuration(router, routing, 60.0, 4.0);
    let plugs = Plugs::default();
    let mut simulation = Simulation::new(&configuration, &plugs);
    simulation.inject_message(1, 2, 4, 0);
    simulation.run();

    let records = &simulation.mutable.message_log.records;
    assert_eq!(records.len(), 1, "the message must be delivered exactly once");
    let record = &records[0];
    assert_eq!(record.size, 4);
    //the output queue serializes one flit per channel cycle
    for window in record.flit_receive_cycles.windows(2)
    {
        assert_eq!(window[0] + 1, window[1], "the output queue must serialize back-to-back");
    }
    let sink = &simulation.shared.network.terminals[2];
    assert_eq!(sink.statistics.consumed_messages, 1);
    //the source recovered all its credits
    let source = &simulation.shared.network.terminals[1];
    assert_eq!(source.available_credits(0), 8);
}

///Several messages from both terminals of a router towards the same remote terminal; the
///unbounded output queues absorb the bursts and everything is delivered.
#[test]
fn converging_bursts()
{
    let router = create_oq_router(2.0, 8.0, 1.0);
    let routing = create_two_router_routing(2);
    let configuration = create_configuration(router, routing, 400.0, 4.0);
    let plugs = Plugs::default();
    let mut simulation = Simulation::new(&configuration, &plugs);
    for index in 0..6
    {
        simulation.inject_message(0, 2, 4, index % 2);
        simulation.inject_message(1, 2, 4, (index + 1) % 2);
    }
    simulation.run();

    let records = &simulation.mutable.message_log.records;
    assert_eq!(records.len(), 12, "every message must be delivered");
    let sink = &simulation.shared.network.terminals[2];
    assert_eq!(sink.statistics.consumed_flits, 48);
    assert_eq!(sink.statistics.consumed_messages, 12);
}
