//! `chainweb3 decode-log`: decode raw topics and data against an ABI.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use chainweb3_abi::{AbiModel, AllEventsLogDecoder, EventLogDecoder, LogDecoder, RawLog};

pub fn run(
    model: Arc<AbiModel>,
    topics: Vec<String>,
    data: String,
    event: Option<&str>,
    address: String,
    as_json: bool,
) -> Result<()> {
    let decoder: Box<dyn LogDecoder> = match event {
        Some(key) => {
            let item = model
                .get_event(key)
                .ok_or_else(|| anyhow!("no event '{key}' in the ABI"))?;
            Box::new(EventLogDecoder::new(Arc::clone(item)))
        }
        None => Box::new(AllEventsLogDecoder::new(model)),
    };

    let log = RawLog {
        address,
        topics,
        data,
        ..Default::default()
    };
    let decoded = decoder.decode(&log)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&decoded)?);
        return Ok(());
    }

    match (&decoded.event, &decoded.signature) {
        (Some(name), Some(sig)) => println!("Event:     {name} ({sig})"),
        (Some(name), None) => println!("Event:     {name} (anonymous)"),
        (None, _) => println!("Event:     <unknown>"),
    }
    println!("Address:   {}", decoded.address);
    if decoded.event.is_none() {
        println!("Topics:    {}", decoded.raw.topics.join(" "));
        println!("Data:      {}", decoded.raw.data);
        return Ok(());
    }
    println!("Values:");
    for (name, value) in &decoded.return_values {
        println!("  {name}: {value}");
    }
    Ok(())
}
