mod common;

use telar_lib::*;
use telar_lib::config::ConfigurationValue;
use common::*;

///A single 4-flit packet walks the two-router fabric: terminal 1 on router 0 sends to
///terminal 2 on router 1. The pipeline takes one cycle per stage, the flits leave the
///routers in consecutive channel cycles on the same virtual channel, and the upstream
///terminal recovers one credit per flit.
#[test]
fn pipeline_walk()
{
    let router = create_ioq_router(2.0, 8.0, 8.0, ConfigurationValue::False, ConfigurationValue::False);
    let routing = create_two_router_routing(2);
    let configuration = create_configuration(router, routing, 40.0, 4.0);
    let plugs = Plugs::default();
    let mut simulation = Simulation::new(&configuration, &plugs);
    simulation.inject_message(1, 2, 4, 0);
    simulation.run();

    let records = &simulation.mutable.message_log.records;
    assert_eq!(records.len(), 1, "the message must be delivered exactly once");
    let record = &records[0];
    assert_eq!(record.origin, 1);
    assert_eq!(record.destination, 2);
    assert_eq!(record.size, 4);
    assert_eq!(record.flit_send_cycles, vec![0, 1, 2, 3], "the terminal streams one flit per channel cycle");
    //RFE, VCA, SWA, crossbar and the output stage take one cycle each in both routers,
    //plus three link traversals
    assert_eq!(record.flit_receive_cycles, vec![13, 14, 15, 16], "flits must arrive in consecutive cycles");
    assert_eq!(record.delivery_cycle, 16);

    //every flit returned its credit to the injecting terminal
    let source = &simulation.shared.network.terminals[1];
    assert_eq!(source.available_credits(0), 8);
    assert_eq!(source.statistics.created_flits, 4);
    let sink = &simulation.shared.network.terminals[2];
    assert_eq!(sink.statistics.consumed_flits, 4);
    assert_eq!(sink.statistics.consumed_messages, 1);
    assert_eq!(sink.statistics.total_message_delay, 16);

    //one packet crossed each router
    match simulation.aggregate_router_statistics()
    {
        Some(ConfigurationValue::Object(name, pairs)) =>
        {
            assert_eq!(name, "InputOutputQueued");
            for (key, value) in pairs
            {
                if key == "packets_arrived" || key == "packets_departed"
                {
                    assert_eq!(value.as_f64().unwrap(), 2.0, "bad {}", key);
                }
            }
        },
        other => panic!("unexpected aggregated statistics {:?}", other),
    }

    //the transaction bracket was closed at delivery
    let transactions = &simulation.mutable.message_log.transactions;
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].2, Some(16));
}

///Traffic in both directions across the inter-router link, several messages per terminal.
///Everything must be delivered, with no credit leaked.
#[test]
fn bidirectional_saturation()
{
    let router = create_ioq_router(2.0, 8.0, 8.0, ConfigurationValue::True, ConfigurationValue::True);
    let routing = create_two_router_routing(2);
    let configuration = create_configuration(router, routing, 600.0, 4.0);
    let plugs = Plugs::default();
    let mut simulation = Simulation::new(&configuration, &plugs);
    let pairs = [(0, 2), (2, 0), (1, 3), (3, 1)];
    let messages_per_pair = 10;
    for &(origin, destination) in pairs.iter()
    {
        for index in 0..messages_per_pair
        {
            simulation.inject_message(origin, destination, 4, index % 2);
        }
    }
    simulation.run();

    let records = &simulation.mutable.message_log.records;
    assert_eq!(records.len(), pairs.len() * messages_per_pair, "every message must be delivered");
    for record in records.iter()
    {
        assert_eq!(record.flit_receive_cycles.len(), record.size);
        //arrival order within a message is its flit order
        for window in record.flit_receive_cycles.windows(2)
        {
            assert!(window[0] < window[1], "flits of a message delivered out of order");
        }
    }
    for terminal in simulation.shared.network.terminals.iter()
    {
        assert_eq!(terminal.statistics.consumed_messages, messages_per_pair);
        //all buffer slots went back to their owners
        assert_eq!(terminal.available_credits(0) + terminal.available_credits(1), 16);
    }
    for transaction in simulation.mutable.message_log.transactions.iter()
    {
        assert!(transaction.2.is_some(), "transaction {} never completed", transaction.0);
    }
}

///With packet locks on both schedulers every packet crosses its port contiguously, so the
///flits of each message reach the terminal in consecutive channel cycles even while two
///sources compete for the same destination.
#[test]
fn packet_lock_keeps_packets_contiguous()
{
    let router = create_ioq_router(2.0, 8.0, 8.0, ConfigurationValue::True, ConfigurationValue::True);
    let routing = create_two_router_routing(2);
    let configuration = create_configuration(router, routing, 200.0, 4.0);
    let plugs = Plugs::default();
    let mut simulation = Simulation::new(&configuration, &plugs);
    simulation.inject_message(0, 2, 4, 0);
    simulation.inject_message(1, 2, 4, 1);
    simulation.run();

    let records = &simulation.mutable.message_log.records;
    assert_eq!(records.len(), 2);
    for record in records.iter()
    {
        for window in record.flit_receive_cycles.windows(2)
        {
            assert_eq!(window[0] + 1, window[1], "a locked port must deliver each packet back-to-back");
        }
    }
}

///A message larger than maximum_packet_size is split into several packets and reassembled
///only when the last flit of the last packet arrives.
#[test]
fn multi_packet_message()
{
    let router = create_ioq_router(2.0, 8.0, 8.0, ConfigurationValue::True, ConfigurationValue::True);
    let routing = create_two_router_routing(2);
    let configuration = create_configuration(router, routing, 100.0, 4.0);
    let plugs = Plugs::default();
    let mut simulation = Simulation::new(&configuration, &plugs);
    //10 flits in packets of 4, 4, 2
    simulation.inject_message(0, 3, 10, 0);
    simulation.run();

    let records = &simulation.mutable.message_log.records;
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.size, 10);
    assert_eq!(record.flit_receive_cycles.len(), 10);
    assert_eq!(record.delivery_cycle, *record.flit_receive_cycles.last().unwrap());
    let sink = &simulation.shared.network.terminals[3];
    assert_eq!(sink.statistics.consumed_messages, 1);
    assert_eq!(sink.statistics.consumed_flits, 10);
}
