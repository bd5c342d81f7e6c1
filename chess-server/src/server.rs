//! 服务器主逻辑
//!
//! 所有状态由一个任务独占（见 [`serve`]），连接任务只负责收发帧，
//! 通过事件队列把消息交给它按顺序处理。

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use protocol::{
    ClientMessage, Connection, ErrorCode, FrameReader, FrameWriter, Listener, PlayerId, ProtocolError,
    ServerMessage, Square, TcpConnection, TcpListener,
};

use crate::config::ServerConfig;
use crate::player::{ConnectionId, PlayerManager};
use crate::session::Session;

/// 每个连接的待发送消息队列长度
const OUTBOX_SIZE: usize = 64;

/// 事件队列长度
const EVENT_QUEUE_SIZE: usize = 256;

/// 单帧写入超时，对端长期不读时关闭连接
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// 服务器状态
#[derive(Default)]
pub struct ServerState {
    pub players: PlayerManager,
    pub session: Session,
    /// 连接 ID -> 消息发送通道
    pub connections: HashMap<ConnectionId, mpsc::Sender<ServerMessage>>,
    /// 发送队列已满、等待清理的连接
    lagging: Vec<ConnectionId>,
}

impl ServerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记新连接
    pub fn register(&mut self, conn: ConnectionId, tx: mpsc::Sender<ServerMessage>) {
        self.connections.insert(conn, tx);
    }

    /// 发送消息给指定连接
    ///
    /// 从不等待：队列满的连接立即被摘除发送端，之后由 [`MessageHandler::drop_lagging`] 清理座位。
    pub fn send_to(&mut self, conn: ConnectionId, msg: ServerMessage) {
        let Some(tx) = self.connections.get(&conn) else {
            return;
        };

        match tx.try_send(msg) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("连接 {} 的发送队列已满，断开该连接", conn);
                self.connections.remove(&conn);
                self.lagging.push(conn);
            }
            Err(TrySendError::Closed(_)) => {
                debug!("连接 {} 的发送队列已关闭", conn);
            }
        }
    }

    /// 广播消息给两个座位上的玩家
    pub fn broadcast(&mut self, msg: ServerMessage) {
        for conn in self.players.seated() {
            self.send_to(conn, msg.clone());
        }
    }

    /// 连接是否仍在服务中
    pub fn is_connected(&self, conn: ConnectionId) -> bool {
        self.connections.contains_key(&conn)
    }

    fn take_lagging(&mut self) -> Vec<ConnectionId> {
        std::mem::take(&mut self.lagging)
    }
}

/// 待发送的消息
struct PendingMessages {
    messages: Vec<(ConnectionId, ServerMessage)>,
    broadcasts: Vec<ServerMessage>,
}

impl PendingMessages {
    fn new() -> Self {
        Self {
            messages: Vec::new(),
            broadcasts: Vec::new(),
        }
    }

    fn send(&mut self, conn: ConnectionId, msg: ServerMessage) {
        self.messages.push((conn, msg));
    }

    fn broadcast(&mut self, msg: ServerMessage) {
        self.broadcasts.push(msg);
    }

    fn flush(self, state: &mut ServerState) {
        for (conn, msg) in self.messages {
            state.send_to(conn, msg);
        }
        for msg in self.broadcasts {
            state.broadcast(msg);
        }
    }
}

/// 消息处理器
pub struct MessageHandler;

impl MessageHandler {
    /// 处理客户端消息，返回值只发给请求方
    pub fn handle(
        state: &mut ServerState,
        conn: ConnectionId,
        msg: ClientMessage,
    ) -> Option<ServerMessage> {
        let mut pending = PendingMessages::new();

        let result = match msg {
            ClientMessage::Join { player_id } => {
                Self::handle_join(state, &mut pending, conn, player_id)
            }
            ClientMessage::MakeMove { from, to } => {
                Self::handle_make_move(state, &mut pending, conn, from, to)
            }
            ClientMessage::Ping => Some(ServerMessage::Pong),
        };

        pending.flush(state);

        result
    }

    /// 处理加入
    fn handle_join(
        state: &mut ServerState,
        pending: &mut PendingMessages,
        conn: ConnectionId,
        player_id: PlayerId,
    ) -> Option<ServerMessage> {
        let color = match state.players.join(conn, player_id.clone()) {
            Ok(color) => color,
            Err(e) => {
                debug!("连接 {} 加入失败: {}", conn, e);
                return Some(ServerMessage::error(e.code()));
            }
        };

        info!("玩家 {} 加入对局，执{}", player_id, color);

        if let Some(opponent) = state.players.opponent_of(conn) {
            pending.send(opponent, ServerMessage::PlayerJoined { player_id, color });
        }

        let game = state.session.state();
        Some(ServerMessage::Joined {
            color,
            board: game.board.clone(),
            side_to_move: game.side_to_move,
            result: state.session.result(),
        })
    }

    /// 处理走棋
    ///
    /// 非法走法不回复任何消息。
    fn handle_make_move(
        state: &mut ServerState,
        pending: &mut PendingMessages,
        conn: ConnectionId,
        from: Square,
        to: Square,
    ) -> Option<ServerMessage> {
        let Some(color) = state.players.color_of(conn) else {
            return Some(ServerMessage::error(ErrorCode::NotJoined));
        };

        let outcome = state.session.make_move(from, to, color)?;

        pending.broadcast(ServerMessage::BoardUpdated {
            board: state.session.state().board.clone(),
            side_to_move: outcome.side_to_move,
            last_move: outcome.mv,
        });

        if let Some(result) = outcome.result {
            info!("对局结束: {}", result);
            pending.broadcast(ServerMessage::GameOver { result });
        }

        None
    }

    /// 处理连接断开
    pub fn handle_disconnect(state: &mut ServerState, conn: ConnectionId) {
        let mut pending = PendingMessages::new();

        state.connections.remove(&conn);

        if let Some(player) = state.players.leave(conn) {
            info!("玩家 {}（{}）离开对局", player.id, player.color);
            pending.broadcast(ServerMessage::PlayerLeft {
                player_id: player.id,
            });

            // 两个座位都空了，对局结束
            if state.players.is_empty() {
                info!("双方都已离开，重置对局");
                state.session.reset();
            }
        }

        pending.flush(state);
    }

    /// 清理发送队列已满的连接，按断开处理
    ///
    /// 清理时的广播可能再让别的连接被摘除，所以循环到没有为止。
    pub fn drop_lagging(state: &mut ServerState) {
        loop {
            let lagging = state.take_lagging();
            if lagging.is_empty() {
                break;
            }
            for conn in lagging {
                Self::handle_disconnect(state, conn);
            }
        }
    }
}

/// 连接任务发给状态任务的事件
#[derive(Debug)]
enum ServerEvent {
    Connected {
        conn: ConnectionId,
        tx: mpsc::Sender<ServerMessage>,
    },
    Message {
        conn: ConnectionId,
        msg: ClientMessage,
    },
    Disconnected {
        conn: ConnectionId,
    },
}

/// 状态任务：按到达顺序逐个处理事件
async fn run_state(mut events: mpsc::Receiver<ServerEvent>) {
    let mut state = ServerState::new();

    while let Some(event) = events.recv().await {
        match event {
            ServerEvent::Connected { conn, tx } => state.register(conn, tx),
            ServerEvent::Message { conn, msg } => {
                // 已被摘除的连接在读端关闭前还会送来消息
                if !state.is_connected(conn) {
                    continue;
                }
                if let Some(reply) = MessageHandler::handle(&mut state, conn, msg) {
                    state.send_to(conn, reply);
                }
            }
            ServerEvent::Disconnected { conn } => {
                MessageHandler::handle_disconnect(&mut state, conn);
            }
        }

        MessageHandler::drop_lagging(&mut state);
    }
}

/// 写任务：把发送队列里的消息写到连接上
async fn write_loop(
    conn: ConnectionId,
    mut writer: FrameWriter<tokio::net::tcp::OwnedWriteHalf>,
    mut outbox: mpsc::Receiver<ServerMessage>,
) {
    while let Some(msg) = outbox.recv().await {
        match tokio::time::timeout(WRITE_TIMEOUT, writer.write_frame(&msg)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!("连接 {} 写入失败: {}", conn, e);
                break;
            }
            Err(_) => {
                warn!("连接 {} 写入超时", conn);
                break;
            }
        }
    }
}

/// 读循环：解码客户端消息并转交给状态任务
async fn read_loop(
    conn: ConnectionId,
    mut reader: FrameReader<tokio::net::tcp::OwnedReadHalf>,
    outbox: &mpsc::Sender<ServerMessage>,
    events: &mpsc::Sender<ServerEvent>,
) {
    loop {
        match reader.read_frame::<ClientMessage>().await {
            Ok(msg) => {
                if events.send(ServerEvent::Message { conn, msg }).await.is_err() {
                    break;
                }
            }
            Err(e @ (ProtocolError::Bincode(_) | ProtocolError::VersionMismatch { .. })) => {
                warn!("连接 {} 发送了无法解析的消息: {}", conn, e);
                if outbox
                    .send(ServerMessage::error(ErrorCode::MalformedMessage))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Err(ProtocolError::ConnectionClosed) => break,
            Err(e) => {
                warn!("连接 {} 读取失败: {}", conn, e);
                break;
            }
        }
    }
}

/// 处理单个连接的整个生命周期
async fn handle_connection(
    conn: ConnectionId,
    connection: TcpConnection,
    events: mpsc::Sender<ServerEvent>,
) {
    let peer = connection.peer_addr().unwrap_or_else(|| "unknown".to_string());
    info!("新连接 {} 来自 {}", conn, peer);

    let (reader, writer) = connection.split();
    let (tx, rx) = mpsc::channel(OUTBOX_SIZE);

    if events
        .send(ServerEvent::Connected {
            conn,
            tx: tx.clone(),
        })
        .await
        .is_err()
    {
        return;
    }

    let mut writer_task = tokio::spawn(write_loop(conn, writer, rx));

    // 写任务先退出（写失败或超时）时也停止读取
    let writer_done = tokio::select! {
        _ = read_loop(conn, reader, &tx, &events) => false,
        _ = &mut writer_task => true,
    };

    info!("连接 {} 已断开", conn);
    let _ = events.send(ServerEvent::Disconnected { conn }).await;

    // 状态任务移除它持有的发送端后，写任务把剩余消息写完再退出
    drop(tx);
    if !writer_done {
        let _ = writer_task.await;
    }
}

/// 在已经绑定的监听器上提供服务，直到监听器出错
pub async fn serve(mut listener: TcpListener) -> anyhow::Result<()> {
    let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_SIZE);
    tokio::spawn(run_state(events_rx));

    let mut next_conn: ConnectionId = 1;

    loop {
        match listener.accept().await {
            Ok(connection) => {
                tokio::spawn(handle_connection(next_conn, connection, events_tx.clone()));
                next_conn += 1;
            }
            Err(ProtocolError::Io(e)) => {
                warn!("接受连接失败: {}", e);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// 绑定配置中的地址并提供服务
pub async fn run(config: &ServerConfig) -> anyhow::Result<()> {
    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("服务端监听 {}", listener.local_addr().unwrap_or(addr));
    serve(listener).await
}
