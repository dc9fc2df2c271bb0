use flume::{Receiver, Sender, TryRecvError};
use trainsim::core::driver::Key;
use trainsim::interfaces::gui_interface::{GuiEvent, RaceState};

/// TrainsimInterface is the GUI's end of the channels to the engine. It keeps the latest race
/// state received.
#[derive(Debug)]
pub struct TrainsimInterface {
    pub rx: Receiver<RaceState>,
    pub tx: Sender<GuiEvent>,
    pub race_state: RaceState,
    pub engine_gone: bool,
}

impl TrainsimInterface {
    pub fn new(rx: Receiver<RaceState>, tx: Sender<GuiEvent>) -> TrainsimInterface {
        TrainsimInterface {
            rx,
            tx,
            race_state: Default::default(),
            engine_gone: false,
        }
    }

    /// update takes the newest race state from the channel. Returns true if a new state arrived.
    pub fn update(&mut self) -> bool {
        let mut received = false;

        loop {
            match self.rx.try_recv() {
                Ok(race_state) => {
                    self.race_state = race_state;
                    received = true;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.engine_gone {
                        tracing::debug!("Engine thread finished, keeping last race state");
                        self.engine_gone = true;
                    }
                    break;
                }
            }
        }
        received
    }

    pub fn send_key(&self, key: Key, pressed: bool) {
        if self.tx.send(GuiEvent::Key { key, pressed }).is_err() && !self.engine_gone {
            tracing::debug!("Engine does not listen anymore, dropped key {:?}", key);
        }
    }

    pub fn quit(&self) {
        // the engine may already be done
        let _ = self.tx.send(GuiEvent::Quit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_the_newest_state() {
        let (tx_state, rx_state) = flume::unbounded();
        let (tx_event, rx_event) = flume::unbounded();
        let mut interface = TrainsimInterface::new(rx_state, tx_event);

        assert!(!interface.update());

        for turn in 1..=3 {
            tx_state
                .send(RaceState {
                    turn,
                    ..RaceState::default()
                })
                .unwrap();
        }
        assert!(interface.update());
        assert_eq!(interface.race_state.turn, 3);

        interface.send_key(Key::Up, true);
        interface.quit();
        assert_eq!(
            rx_event.try_recv().unwrap(),
            GuiEvent::Key {
                key: Key::Up,
                pressed: true
            }
        );
        assert_eq!(rx_event.try_recv().unwrap(), GuiEvent::Quit);

        drop(tx_state);
        assert!(!interface.update());
        assert!(interface.engine_gone);
        assert_eq!(interface.race_state.turn, 3);
    }
}
