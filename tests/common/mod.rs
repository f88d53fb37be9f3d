
use telar_lib::config::ConfigurationValue;

pub fn create_lslp_arbiter() -> ConfigurationValue
{
    ConfigurationValue::Object("Lslp".to_string(), vec![])
}

pub fn create_islip_allocator(iterations: f64) -> ConfigurationValue
{
    ConfigurationValue::Object("Islip".to_string(), vec![
        ("iterations".to_string(), ConfigurationValue::Number(iterations)),
        ("slip_latch".to_string(), ConfigurationValue::True),
        ("resource_arbiter".to_string(), create_lslp_arbiter()),
        ("client_arbiter".to_string(), create_lslp_arbiter()),
    ])
}

pub fn create_crossbar_scheduler(packet_lock: ConfigurationValue, idle_unlock: ConfigurationValue, iterations: f64) -> ConfigurationValue
{
    ConfigurationValue::Object("CrossbarScheduler".to_string(), vec![
        ("full_packet".to_string(), ConfigurationValue::False),
        ("packet_lock".to_string(), packet_lock),
        ("idle_unlock".to_string(), idle_unlock),
        ("allocator".to_string(), create_islip_allocator(iterations)),
    ])
}

pub fn create_vc_scheduler() -> ConfigurationValue
{
    ConfigurationValue::Object("VcScheduler".to_string(), vec![
        ("allocator".to_string(), create_islip_allocator(1.0)),
    ])
}

pub fn create_congestion_status() -> ConfigurationValue
{
    ConfigurationValue::Object("CongestionStatus".to_string(), vec![
        ("style".to_string(), ConfigurationValue::Literal("relative".to_string())),
    ])
}

pub fn create_ioq_router(virtual_channels: f64, input_queue_depth: f64, output_queue_depth: f64, packet_lock: ConfigurationValue, idle_unlock: ConfigurationValue) -> ConfigurationValue
{
    ConfigurationValue::Object("InputOutputQueued".to_string(), vec![
        ("virtual_channels".to_string(), ConfigurationValue::Number(virtual_channels)),
        ("input_queue_depth".to_string(), ConfigurationValue::Number(input_queue_depth)),
        ("output_queue_depth".to_string(), ConfigurationValue::Number(output_queue_depth)),
        ("vc_scheduler".to_string(), create_vc_scheduler()),
        ("crossbar_scheduler".to_string(), create_crossbar_scheduler(packet_lock.clone(), idle_unlock.clone(), 2.0)),
        ("output_crossbar_scheduler".to_string(), create_crossbar_scheduler(packet_lock, idle_unlock, 1.0)),
        ("congestion_mode".to_string(), ConfigurationValue::Literal("downstream".to_string())),
        ("congestion_status".to_string(), create_congestion_status()),
    ])
}

pub fn create_oq_router(virtual_channels: f64, input_queue_depth: f64, transfer_latency: f64) -> ConfigurationValue
{
    ConfigurationValue::Object("OutputQueued".to_string(), vec![
        ("virtual_channels".to_string(), ConfigurationValue::Number(virtual_channels)),
        ("input_queue_depth".to_string(), ConfigurationValue::Number(input_queue_depth)),
        ("transfer_latency".to_string(), ConfigurationValue::Number(transfer_latency)),
        //the lock keeps each packet contiguous on its channel, as the downstream
        //reception requires
        ("output_crossbar_scheduler".to_string(), create_crossbar_scheduler(ConfigurationValue::True, ConfigurationValue::True, 1.0)),
        ("congestion_mode".to_string(), ConfigurationValue::Literal("output".to_string())),
        ("congestion_status".to_string(), ConfigurationValue::Object("CongestionStatus".to_string(), vec![
            ("style".to_string(), ConfigurationValue::Literal("absolute".to_string())),
            ("absolute_window".to_string(), ConfigurationValue::Number(32.0)),
        ])),
    ])
}

pub fn create_link_classes() -> ConfigurationValue
{
    ConfigurationValue::Array(vec![
        //class 0: links between routers
        ConfigurationValue::Object("LinkClass".to_string(), vec![
            ("delay".to_string(), ConfigurationValue::Number(1.0)),
        ]),
        //class 1: links between terminal and router
        ConfigurationValue::Object("LinkClass".to_string(), vec![
            ("delay".to_string(), ConfigurationValue::Number(1.0)),
        ]),
    ])
}

///Two 4-port routers joined by their port 3, with terminals 0,1 on router 0 and 2,3 on
///router 1, always at ports 0,1. Port 2 stays disconnected on both.
pub fn create_two_router_wiring() -> ConfigurationValue
{
    let terminal_link = |terminal: f64, router: f64, port: f64| ConfigurationValue::Object("TerminalLink".to_string(), vec![
        ("terminal".to_string(), ConfigurationValue::Number(terminal)),
        ("router".to_string(), ConfigurationValue::Number(router)),
        ("port".to_string(), ConfigurationValue::Number(port)),
        ("link_class".to_string(), ConfigurationValue::Number(1.0)),
    ]);
    ConfigurationValue::Object("Wiring".to_string(), vec![
        ("routers".to_string(), ConfigurationValue::Number(2.0)),
        ("ports_per_router".to_string(), ConfigurationValue::Number(4.0)),
        ("terminals".to_string(), ConfigurationValue::Number(4.0)),
        ("links".to_string(), ConfigurationValue::Array(vec![
            ConfigurationValue::Object("Link".to_string(), vec![
                ("first_router".to_string(), ConfigurationValue::Number(0.0)),
                ("first_port".to_string(), ConfigurationValue::Number(3.0)),
                ("second_router".to_string(), ConfigurationValue::Number(1.0)),
                ("second_port".to_string(), ConfigurationValue::Number(3.0)),
                ("link_class".to_string(), ConfigurationValue::Number(0.0)),
            ]),
        ])),
        ("terminal_links".to_string(), ConfigurationValue::Array(vec![
            terminal_link(0.0, 0.0, 0.0),
            terminal_link(1.0, 0.0, 1.0),
            terminal_link(2.0, 1.0, 0.0),
            terminal_link(3.0, 1.0, 1.0),
        ])),
    ])
}

///The full candidate table for `create_two_router_wiring`: local destinations leave by the
///terminal port, remote ones by port 3, offering every virtual channel.
pub fn create_two_router_routing(virtual_channels: usize) -> ConfigurationValue
{
    let mut routes = vec![];
    let egress = |port: usize, virtual_channel: usize| ConfigurationValue::Object("Egress".to_string(), vec![
        ("port".to_string(), ConfigurationValue::Number(port as f64)),
        ("virtual_channel".to_string(), ConfigurationValue::Number(virtual_channel as f64)),
    ]);
    for router in 0..2
    {
        for destination in 0..4
        {
            let local = destination / 2 == router;
            let exit_port = if local { destination % 2 } else { 3 };
            let candidates = (0..virtual_channels).map(|vc| egress(exit_port, vc)).collect();
            routes.push(ConfigurationValue::Object("Route".to_string(), vec![
                ("router".to_string(), ConfigurationValue::Number(router as f64)),
                ("destination".to_string(), ConfigurationValue::Number(destination as f64)),
                ("candidates".to_string(), ConfigurationValue::Array(candidates)),
            ]));
        }
    }
    ConfigurationValue::Object("TableRouting".to_string(), vec![
        ("routes".to_string(), ConfigurationValue::Array(routes)),
    ])
}

pub fn create_configuration(router: ConfigurationValue, routing: ConfigurationValue, measured: f64, maximum_packet_size: f64) -> ConfigurationValue
{
    ConfigurationValue::Object("Configuration".to_string(), vec![
        ("random_seed".to_string(), ConfigurationValue::Number(1.0)),
        ("warmup".to_string(), ConfigurationValue::Number(0.0)),
        ("measured".to_string(), ConfigurationValue::Number(measured)),
        ("maximum_packet_size".to_string(), ConfigurationValue::Number(maximum_packet_size)),
        ("metadata_handler".to_string(), ConfigurationValue::Literal("creation_timestamp".to_string())),
        ("router".to_string(), router),
        ("routing".to_string(), routing),
        ("link_classes".to_string(), create_link_classes()),
        ("wiring".to_string(), create_two_router_wiring()),
    ])
}
