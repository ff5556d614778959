//! # Summary
//!
//! Accept loop for a replica. Clients and peers share one listener; every
//! connection gets its own task, which answers requests in order until the
//! remote end hangs up.

use std::sync::Arc;

use futures::{SinkExt, TryStreamExt};
use tokio::net::{TcpListener, TcpStream};

use crate::error::Result;
use crate::message::{Reply, Request};
use crate::replica::Replica;
use crate::socket;

/// Serves `replica` on `listener` forever.
pub async fn serve(listener: TcpListener, replica: Arc<Replica>) {
    loop {
        match listener.accept().await {
        | Ok((stream, address)) => {
            trace!("accepted connection from {}", address);
            let replica = replica.clone();
            tokio::spawn(async move {
                if let Err(error) = connection(stream, &replica).await {
                    debug!("connection from {} dropped: {}", address, error);
                }
            });
        }
        | Err(error) => warn!("failed to accept connection: {}", error),
        }
    }
}

async fn connection(stream: TcpStream, replica: &Replica) -> Result<()> {
    stream.set_nodelay(true)?;
    let mut socket = socket::new::<Request, Reply>(stream);
    while let Some(request) = socket.try_next().await? {
        let reply = replica.respond(request).await;
        trace!("sending {:?}", reply);
        socket.send(reply).await?;
    }
    Ok(())
}
