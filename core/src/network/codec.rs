//! Length-prefixed request/response codec for overlay packets

use async_trait::async_trait;
use futures::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use libp2p::request_response::Codec;
use libp2p::StreamProtocol;
use std::io;

use crate::network::packet::SignedPacket;

/// Frames above this size are rejected
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

#[derive(Clone, Default)]
pub struct OverlayCodec();

/// Empty acknowledgement of a received packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketAck;

#[async_trait]
impl Codec for OverlayCodec {
    type Protocol = StreamProtocol;
    type Request = SignedPacket;
    type Response = PacketAck;

    async fn read_request<T>(&mut self, _: &StreamProtocol, io: &mut T) -> io::Result<SignedPacket>
    where
        T: AsyncRead + Unpin + Send,
    {
        let buf = read_frame(io).await?;
        SignedPacket::from_bytes(&buf)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "Invalid packet"))
    }

    async fn read_response<T>(&mut self, _: &StreamProtocol, io: &mut T) -> io::Result<PacketAck>
    where
        T: AsyncRead + Unpin + Send,
    {
        read_frame(io).await?;
        Ok(PacketAck)
    }

    async fn write_request<T>(
        &mut self,
        _: &StreamProtocol,
        io: &mut T,
        packet: SignedPacket,
    ) -> io::Result<()>
    where
        T: AsyncWrite + Unpin + Send,
    {
        write_frame(io, &packet.to_bytes()).await
    }

    async fn write_response<T>(
        &mut self,
        _: &StreamProtocol,
        io: &mut T,
        PacketAck: PacketAck,
    ) -> io::Result<()>
    where
        T: AsyncWrite + Unpin + Send,
    {
        write_frame(io, &[]).await
    }
}

pub type OverlayBehaviour = libp2p::request_response::Behaviour<OverlayCodec>;
pub type OverlayEvent = libp2p::request_response::Event<SignedPacket, PacketAck>;

async fn read_frame<T>(io: &mut T) -> io::Result<Vec<u8>>
where
    T: AsyncRead + Unpin + Send,
{
    let mut len = [0u8; 4];
    io.read_exact(&mut len).await?;
    let len = u32::from_be_bytes(len) as usize;
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "Frame too large"));
    }

    let mut buf = vec![0u8; len];
    io.read_exact(&mut buf).await?;
    Ok(buf)
}

async fn write_frame<T>(io: &mut T, data: &[u8]) -> io::Result<()>
where
    T: AsyncWrite + Unpin + Send,
{
    if data.len() > MAX_FRAME_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "Frame too large"));
    }
    io.write_all(&(data.len() as u32).to_be_bytes()).await?;
    io.write_all(data).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::io::Cursor;
    use libp2p::identity::Keypair;

    fn protocol() -> StreamProtocol {
        StreamProtocol::new("/peermsg/test/1.0.0")
    }

    #[tokio::test]
    async fn test_request_frame_round_trip() {
        let key = Keypair::generate_ed25519();
        let packet = SignedPacket::seal(&key, 1, b"frame".to_vec()).unwrap();
        let mut codec = OverlayCodec::default();

        let mut wire = Cursor::new(Vec::new());
        codec.write_request(&protocol(), &mut wire, packet.clone()).await.unwrap();

        let bytes = wire.into_inner();
        assert_eq!(&bytes[..4], &((bytes.len() - 4) as u32).to_be_bytes());

        let mut reader = Cursor::new(bytes);
        let restored = codec.read_request(&protocol(), &mut reader).await.unwrap();
        assert_eq!(restored, packet);
    }

    #[tokio::test]
    async fn test_oversized_frame_is_rejected() {
        let mut bytes = ((MAX_FRAME_LEN + 1) as u32).to_be_bytes().to_vec();
        bytes.extend_from_slice(b"{}");
        let mut reader = Cursor::new(bytes);

        let err = OverlayCodec::default()
            .read_request(&protocol(), &mut reader)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_truncated_frame_fails() {
        let mut reader = Cursor::new(vec![0, 0, 0, 10, b'{']);
        assert!(OverlayCodec::default()
            .read_request(&protocol(), &mut reader)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_ack_is_an_empty_frame() {
        let mut codec = OverlayCodec::default();
        let mut wire = Cursor::new(Vec::new());
        codec.write_response(&protocol(), &mut wire, PacketAck).await.unwrap();
        assert_eq!(wire.get_ref(), &vec![0, 0, 0, 0]);

        let mut reader = Cursor::new(wire.into_inner());
        assert_eq!(codec.read_response(&protocol(), &mut reader).await.unwrap(), PacketAck);
    }
}
