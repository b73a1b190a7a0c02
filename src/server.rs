/*!
 * Command Execution
 *
 * The server context owns every table and all mutable state (dictionary
 * selection, subscriptions, backend contents). `exec` dispatches one
 * request to completion; the built-in command handlers live here too.
 */

use crate::command::{CommandTable, Handler, Request};
use crate::dictionary::{Dictionaries, Medium};
use crate::error::Error;
use crate::hwkeys::HardwareKeys;
use crate::keyindex::KeyIndex;
use crate::pubsub::{PubSub, Publication, Slot};
use crate::storage::RamStore;
use bytes::{Bytes, BytesMut};

/// Dictionary server context
pub struct Server {
    pub commands: CommandTable,
    pub dictionaries: Dictionaries,
    pub keys: KeyIndex,
    pub hw_keys: HardwareKeys,
    pub pubsub: PubSub,
}

impl Server {
    pub fn new(
        commands: CommandTable,
        dictionaries: Dictionaries,
        keys: KeyIndex,
        hw_keys: HardwareKeys,
        pubsub: PubSub,
    ) -> Self {
        Self {
            commands,
            dictionaries,
            keys,
            hw_keys,
            pubsub,
        }
    }

    /// Dispatch one request and write its reply to `out`
    ///
    /// `slot` is the caller's subscriber slot. A successful PUBLISH returns
    /// the message for the transport to deliver.
    pub fn exec(&mut self, argv: &[Bytes], slot: Option<Slot>, out: &mut BytesMut) -> Option<Publication> {
        let Some(name) = argv.first() else {
            crate::protocol::write_error(&Error::UnknownCommand(String::new()), out);
            return None;
        };
        let handler = self.commands.lookup(name);
        let mut req = Request::new(argv, slot, out);
        handler(self, &mut req);
        req.into_publication()
    }

    /// Storage of the selected dictionary for RAM-kind access
    fn ram(&mut self) -> Option<RamStore<'_>> {
        let Server { dictionaries, keys, .. } = self;
        match &mut dictionaries.current_mut().medium {
            Medium::Ram(backend) => Some(RamStore::new(&mut **backend, keys)),
            Medium::Rom(_) => None,
        }
    }

    #[cfg(test)]
    pub(crate) fn minimal() -> Self {
        use crate::dictionary::Dictionary;
        use crate::storage::Rom;
        Self::new(
            CommandTable::new(crate::command::unknown_command),
            Dictionaries::new(vec![Dictionary::rom("ROM", Rom::new(&[]))]),
            KeyIndex::default(),
            HardwareKeys::default(),
            PubSub::new(Vec::<&str>::new()),
        )
    }
}

/// The standard command set, in table order
pub fn builtin_commands() -> CommandTable {
    const BUILTINS: &[(&str, Handler)] = &[
        ("COMMANDS", commands),
        ("SELECT", select),
        ("KEYS", keys),
        ("GET", get),
        ("SET", set),
        ("DEL", del),
        ("READ", read),
        ("WRITE", write),
        ("PUBLISH", publish),
        ("SUBSCRIBE", subscribe),
        ("UNSUBSCRIBE", unsubscribe),
    ];
    BUILTINS
        .iter()
        .fold(CommandTable::new(crate::command::unknown_command), |t, (name, h)| t.with(*name, *h))
}

/// COMMANDS - names of every command in table order
pub fn commands(server: &mut Server, req: &mut Request<'_>) {
    if !req.expect_args(1, 1) {
        return;
    }
    req.respond_array(server.commands.names());
}

/// SELECT - list dictionaries, or SELECT name
pub fn select(server: &mut Server, req: &mut Request<'_>) {
    if !req.expect_args(1, 2) {
        return;
    }
    let argv = req.argv;
    match argv.get(1) {
        None => {
            let names: Vec<&str> = server.dictionaries.list().map(|(n, _)| n).collect();
            req.respond_array(names);
        }
        Some(name) => {
            let result = server.dictionaries.select(name);
            req.respond(result);
        }
    }
}

/// KEYS - every key of the selected dictionary
pub fn keys(server: &mut Server, req: &mut Request<'_>) {
    if !req.expect_args(1, 1) {
        return;
    }
    if let Medium::Rom(rom) = &server.dictionaries.current().medium {
        let names: Vec<&str> = rom.keys().collect();
        req.respond_array(names);
        return;
    }
    if let Some(store) = server.ram() {
        req.respond_array(store.keys());
    }
}

/// GET key
pub fn get(server: &mut Server, req: &mut Request<'_>) {
    if !req.expect_args(2, 2) {
        return;
    }
    let argv = req.argv;
    let key = &argv[1];
    let value = match &server.dictionaries.current().medium {
        Medium::Rom(rom) => rom.get(key).map(|v| v.as_bytes().to_vec()),
        Medium::Ram(_) => server.ram().and_then(|store| store.get(key)),
    };
    match value {
        Some(v) => req.respond_bulk(&v),
        None => req.respond_error(&Error::KeyNotFound),
    }
}

/// SET key value
pub fn set(server: &mut Server, req: &mut Request<'_>) {
    if !req.expect_args(3, 3) {
        return;
    }
    let argv = req.argv;
    let result = match server.ram() {
        Some(mut store) => store.set(&argv[1], &argv[2]),
        None => Err(Error::ReadOnly),
    };
    req.respond(result);
}

/// DEL key
pub fn del(server: &mut Server, req: &mut Request<'_>) {
    if !req.expect_args(2, 2) {
        return;
    }
    let argv = req.argv;
    let result = match server.ram() {
        Some(mut store) => {
            if store.del(&argv[1]) {
                Ok(())
            } else {
                Err(Error::KeyNotFound)
            }
        }
        None => Err(Error::ReadOnly),
    };
    req.respond(result);
}

/// READ key - routed to the key's hardware read handler
pub fn read(server: &mut Server, req: &mut Request<'_>) {
    if !req.expect_args(2, 2) {
        return;
    }
    let handler = server.hw_keys.lookup(&req.argv[1]).read;
    handler(server, req);
}

/// WRITE key value - routed to the key's hardware write handler
pub fn write(server: &mut Server, req: &mut Request<'_>) {
    if !req.expect_args(3, 3) {
        return;
    }
    let handler = server.hw_keys.lookup(&req.argv[1]).write;
    handler(server, req);
}

/// PUBLISH channel message - replies with the number of receivers
pub fn publish(server: &mut Server, req: &mut Request<'_>) {
    if !req.expect_args(3, 3) {
        return;
    }
    let argv = req.argv;
    let idx = match server.pubsub.channel_index(&argv[1]) {
        Ok(idx) => idx,
        Err(e) => return req.respond_error(&e),
    };
    let subscribers = server.pubsub.subscribers_of(idx);
    req.respond_integer(subscribers.len() as i64);
    if !subscribers.is_empty() {
        req.publish(Publication {
            channel: server.pubsub.channels()[idx].clone(),
            payload: argv[2].clone(),
            subscribers,
        });
    }
}

/// SUBSCRIBE channel [channel ...]
pub fn subscribe(server: &mut Server, req: &mut Request<'_>) {
    update_subscriptions(server, req, PubSub::subscribe);
}

/// UNSUBSCRIBE channel [channel ...]
pub fn unsubscribe(server: &mut Server, req: &mut Request<'_>) {
    update_subscriptions(server, req, PubSub::unsubscribe);
}

/// Every channel name is resolved before any bit changes
fn update_subscriptions(server: &mut Server, req: &mut Request<'_>, apply: fn(&mut PubSub, usize, Slot)) {
    if !req.expect_args(2, usize::MAX) {
        return;
    }
    let Some(slot) = req.slot else {
        return req.respond_error(&Error::NoSubscriberSlot);
    };
    let argv = req.argv;
    let channels: crate::Result<Vec<usize>> = argv[1..]
        .iter()
        .map(|name| server.pubsub.channel_index(name))
        .collect();
    let result = channels.map(|channels| {
        for idx in channels {
            apply(&mut server.pubsub, idx, slot);
        }
    });
    req.respond(result);
}
