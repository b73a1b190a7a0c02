/*!
 * Network Layer and Event Loop
 *
 * A single mio event loop owns the server context, so every request is
 * dispatched to completion before the next one starts. Each connection is
 * given the lowest free subscriber slot; published messages are pushed to
 * the connections holding the subscribed slots.
 */

use crate::protocol::{parse_many, write_protocol_error, Argv};
use crate::pubsub::{Publication, Slot};
use crate::server::Server;
use anyhow::*;
use bytes::BytesMut;
use hashbrown::HashMap;
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use socket2::{Domain, Protocol, Socket, Type};
use std::io::{Read, Write};
use std::net::SocketAddr;
use std::result::Result::{Err, Ok};

/// Size of read buffer for incoming data
const READ_BUF: usize = 4096;

const LISTENER: Token = Token(0);

/// Bind a non-blocking TCP listener with SO_REUSEADDR
///
/// Uses socket2 so the address can be reused right after a restart.
///
/// # Arguments
/// * `addr` - Address to listen on; port 0 picks a free port
///
/// # Returns
/// * A mio listener ready to be passed to `run`
pub fn bind(addr: SocketAddr) -> Result<TcpListener> {
    let domain = match addr {
        SocketAddr::V4(_) => Domain::IPV4,
        SocketAddr::V6(_) => Domain::IPV6,
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

    #[cfg(unix)]
    socket.set_reuse_address(true)?;

    socket.set_nonblocking(true)?;
    socket
        .bind(&addr.into())
        .with_context(|| format!("bind {}", addr))?;
    socket.listen(128)?;

    Ok(TcpListener::from_std(socket.into()))
}

/// Per-connection state
struct Client {
    sock: TcpStream,
    rbuf: BytesMut,
    wbuf: BytesMut,
    slot: Option<Slot>,
    /// Peer finished sending; dropped once `wbuf` drains
    closing: bool,
}

/// Subscriber slot -> connection token
#[derive(Default)]
struct SlotTable {
    owners: [Option<usize>; Slot::COUNT],
}

impl SlotTable {
    fn claim(&mut self, tok: usize) -> Option<Slot> {
        let free = self.owners.iter().position(Option::is_none)?;
        self.owners[free] = Some(tok);
        Slot::new(free)
    }

    fn release(&mut self, slot: Slot) {
        self.owners[slot.index()] = None;
    }

    fn owner(&self, slot: Slot) -> Option<usize> {
        self.owners[slot.index()]
    }
}

/// Serve `server` on `listener` until a fatal poll error
///
/// Runs the whole event loop on the calling thread: accepts connections,
/// parses pipelined requests, dispatches each through `Server::exec` and
/// pushes published messages to the subscribed connections.
///
/// # Arguments
/// * `listener` - Listener from `bind`
/// * `server` - Server context; owned by the loop for its lifetime
///
/// # Returns
/// * Only on a poll or registration failure
pub fn run(mut listener: TcpListener, mut server: Server) -> Result<()> {
    let mut poll = Poll::new()?;
    let mut events = Events::with_capacity(1024);
    poll.registry()
        .register(&mut listener, LISTENER, Interest::READABLE)?;

    log::info!("listening on {}", listener.local_addr()?);

    let mut clients: HashMap<usize, Client> = HashMap::new();
    let mut slots = SlotTable::default();
    let mut next_tok: usize = 1;

    let mut tmp_buf = [0u8; READ_BUF];
    let mut requests: Vec<Argv> = Vec::with_capacity(32);
    let mut published: Vec<Publication> = Vec::new();

    loop {
        poll.poll(&mut events, None)?;

        for ev in events.iter() {
            match ev.token() {
                LISTENER => loop {
                    match listener.accept() {
                        Ok((mut sock, peer)) => {
                            sock.set_nodelay(true).ok();
                            let tok = next_tok;
                            next_tok = next_tok.wrapping_add(1);
                            if next_tok == 0 {
                                next_tok = 1; // Skip 0 (LISTENER)
                            }

                            poll.registry()
                                .register(&mut sock, Token(tok), Interest::READABLE)?;

                            let slot = slots.claim(tok);
                            log::info!("connection {} from {} (slot {:?})", tok, peer, slot);
                            clients.insert(
                                tok,
                                Client {
                                    sock,
                                    rbuf: BytesMut::with_capacity(READ_BUF),
                                    wbuf: BytesMut::new(),
                                    slot,
                                    closing: false,
                                },
                            );
                        }
                        Err(ref e) if would_block(e) => break,
                        Err(e) => {
                            log::warn!("accept failed: {}", e);
                            break;
                        }
                    }
                },
                Token(t) => {
                    let Some(client) = clients.get_mut(&t) else {
                        continue;
                    };
                    let mut alive = true;

                    if ev.is_readable() && !client.closing {
                        loop {
                            match client.sock.read(&mut tmp_buf) {
                                Ok(0) => {
                                    client.closing = true;
                                    break;
                                }
                                Ok(n) => client.rbuf.extend_from_slice(&tmp_buf[..n]),
                                Err(ref e) if would_block(e) => break,
                                Err(_) => {
                                    alive = false;
                                    break;
                                }
                            }
                        }

                        // Requests parsed before a framing error are still served
                        let parsed = parse_many(&mut client.rbuf, &mut requests);
                        for argv in requests.drain(..) {
                            if let Some(p) = server.exec(&argv, client.slot, &mut client.wbuf) {
                                published.push(p);
                            }
                        }
                        if let Err(e) = parsed {
                            log::warn!("connection {}: {}", t, e);
                            write_protocol_error(&e, &mut client.wbuf);
                            client.rbuf.clear();
                        }
                    }

                    if alive {
                        alive = flush(&poll, t, client);
                    }
                    if !alive {
                        drop_client(&mut clients, &mut slots, &mut server, t);
                    }
                }
            }

            // Deliver after the publisher's own reply is queued
            for p in published.drain(..) {
                deliver(&p, &poll, &mut clients, &mut slots, &mut server);
            }
        }
    }
}

/// Queue a publication on every subscribed connection
fn deliver(
    p: &Publication,
    poll: &Poll,
    clients: &mut HashMap<usize, Client>,
    slots: &mut SlotTable,
    server: &mut Server,
) {
    for slot in p.subscribers.iter() {
        let Some(tok) = slots.owner(slot) else {
            continue;
        };
        let Some(client) = clients.get_mut(&tok) else {
            continue;
        };
        p.encode(&mut client.wbuf);
        if !flush(poll, tok, client) {
            drop_client(clients, slots, server, tok);
        }
    }
}

/// Write what the socket takes and update interest
///
/// # Arguments
/// * `poll` - Poll the connection is registered with
/// * `tok` - Token of the connection
/// * `client` - Connection whose `wbuf` is written
///
/// # Returns
/// * `false` when the connection is dead, or the peer has closed its side
///   and every pending reply has been written
fn flush(poll: &Poll, tok: usize, client: &mut Client) -> bool {
    while !client.wbuf.is_empty() {
        match client.sock.write(&client.wbuf) {
            Ok(0) => return false,
            Ok(n) => {
                let _ = client.wbuf.split_to(n);
            }
            Err(ref e) if would_block(e) => break,
            Err(_) => return false,
        }
    }

    if client.closing && client.wbuf.is_empty() {
        return false;
    }

    let interest = if client.wbuf.is_empty() {
        Interest::READABLE
    } else {
        Interest::READABLE | Interest::WRITABLE
    };
    poll.registry()
        .reregister(&mut client.sock, Token(tok), interest)
        .is_ok()
}

/// Forget a connection and release its subscriptions
fn drop_client(clients: &mut HashMap<usize, Client>, slots: &mut SlotTable, server: &mut Server, tok: usize) {
    if let Some(client) = clients.remove(&tok) {
        if let Some(slot) = client.slot {
            server.pubsub.unsubscribe_all(slot);
            slots.release(slot);
        }
        log::info!("connection {} closed", tok);
    }
}

/// Check if an I/O error indicates the operation would block
#[inline]
fn would_block(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::Interrupted
    )
}
