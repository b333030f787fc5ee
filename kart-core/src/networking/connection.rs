use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;

use log::{info, warn};

use super::Packet;
use crate::error::Result;

// every packet is preceded by its size as a big-endian u16
const MAX_PACKET_SIZE: u64 = u16::MAX as u64;

pub struct Connection<T: Packet, V: Packet> {
    tcp_stream: TcpStream,
    incoming_packets: VecDeque<T>,
    outgoing_packets: VecDeque<V>,
    closed: bool,
}

impl<T: Packet, V: Packet> Connection<T, V> {
    pub fn new(tcp_stream: TcpStream) -> Result<Connection<T, V>> {
        // disable the Nagle algorithm to allow for real-time transfers
        tcp_stream.set_nodelay(true)?;
        Ok(Connection {
            tcp_stream,
            incoming_packets: VecDeque::new(),
            outgoing_packets: VecDeque::new(),
            closed: false,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn peer_address(&self) -> String {
        self.tcp_stream
            .peer_addr()
            .map(|address| address.to_string())
            .unwrap_or_else(|_| String::from("<disconnected>"))
    }

    pub fn sync_incoming(&mut self) -> Result<()> {
        // fetch packets for this connection until exhausted
        while !self.closed {
            // allows us to keep going if there's no input
            self.tcp_stream.set_nonblocking(true)?;

            let mut buffer: [u8; 2] = [0, 0];
            let packet_size = match self.tcp_stream.read_exact(&mut buffer) {
                Ok(_) => u16::from_be_bytes(buffer),
                // not enough new data on this connection yet
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(ref e)
                    if e.kind() == ErrorKind::ConnectionReset
                        || e.kind() == ErrorKind::UnexpectedEof =>
                {
                    info!("{} disconnected", self.peer_address());
                    self.closed = true;
                    break;
                }
                Err(e) => return Err(e.into()),
            };

            // the size arrived, so block until the whole payload has too
            self.tcp_stream.set_nonblocking(false)?;
            let packet =
                T::parse_packet(&mut Read::by_ref(&mut self.tcp_stream).take(packet_size as u64))?;

            self.incoming_packets.push_back(packet);
        }
        Ok(())
    }

    pub fn pop_incoming(&mut self) -> Option<T> {
        self.incoming_packets.pop_front()
    }

    pub fn push_outgoing(&mut self, packet: V) {
        self.outgoing_packets.push_back(packet);
    }

    // send packets on this connection until exhausted
    pub fn sync_outgoing(&mut self) -> Result<()> {
        if self.closed {
            self.outgoing_packets.clear();
            return Ok(());
        }

        self.tcp_stream.set_nonblocking(false)?;
        while let Some(packet) = self.outgoing_packets.pop_front() {
            let size = packet.packet_size()?;
            if size > MAX_PACKET_SIZE {
                warn!("dropping a {} byte packet, too large to frame", size);
                continue;
            }

            self.tcp_stream.write_all(&(size as u16).to_be_bytes())?;
            packet.write_packet(&mut self.tcp_stream)?;
        }
        Ok(())
    }
}
